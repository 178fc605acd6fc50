pub mod appraisal;
