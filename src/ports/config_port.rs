//! Configuration access port trait.
//!
//! [`ConfigPort::get_int`] falls back to `default` when the key is absent or
//! does not parse; use [`ConfigPort::get_string`] to tell the two apart.

pub trait ConfigPort {
    fn get_string(&self, section: &str, key: &str) -> Option<String>;
    fn get_int(&self, section: &str, key: &str, default: i64) -> i64;
}
