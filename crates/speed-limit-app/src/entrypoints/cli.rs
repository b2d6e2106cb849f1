use clap::Parser;

/// Generic function to get environment variable, parsing it to the desired type.
///
/// Unset variables and values that fail to parse both yield `None`.
pub fn get_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    let value = std::env::var(key).ok()?;
    match value.trim().parse() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            tracing::warn!("Ignoring {key}={value:?}: not a valid value");
            None
        }
    }
}

/// Parses from the command line arguments.
pub fn parse_args<T: Parser>() -> Result<T, clap::Error> {
    T::try_parse()
}
