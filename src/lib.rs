use rand::Rng;

pub mod cli;
pub mod config;
pub mod operator;
pub mod release;
pub mod target;

/// Generate a random alphanumeric identifier, used to keep workspace names
/// unique across concurrent invocations against the same host.
pub fn random_suffix(len: usize) -> String {
    rand::rng()
        .sample_iter(&rand::distr::Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}
