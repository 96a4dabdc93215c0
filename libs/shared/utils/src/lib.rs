pub mod extractor;
pub mod jwt;
pub mod time;
pub mod test_utils;
