mod common;
mod release;
mod routing;
mod scoring;
