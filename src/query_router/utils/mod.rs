use serde::Serialize;

pub fn pretty_log<T: Serialize>(message: &str, data: &T) {
    match serde_json::to_string_pretty(data) {
        Ok(pretty) => tracing::debug!("{message} {pretty}"),
        Err(error) => tracing::warn!(%error, "{message} (unserializable)"),
    }
}
