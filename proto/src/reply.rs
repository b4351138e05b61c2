use serde::{Deserialize, Serialize};

use crate::DfsError;

/// Envelope of every HTTP reply: `{"ok": T}` or `{"err": DfsError}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reply<T> {
    Ok(T),
    Err(DfsError),
}

impl<T> Reply<T> {
    pub fn into_result(self) -> Result<T, DfsError> {
        match self {
            Reply::Ok(value) => Ok(value),
            Reply::Err(err) => Err(err),
        }
    }
}

impl<T> From<Result<T, DfsError>> for Reply<T> {
    fn from(result: Result<T, DfsError>) -> Self {
        match result {
            Ok(value) => Reply::Ok(value),
            Err(err) => Reply::Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_replies_decode_from_null() {
        let reply: Reply<()> = serde_json::from_str(r#"{"ok":null}"#).unwrap();
        assert_eq!(reply.into_result(), Ok(()));
    }

    #[test]
    fn error_replies_keep_their_kind() {
        let json = r#"{"err":{"kind":"already_exists","path":"/b/a.txt"}}"#;
        let reply: Reply<u64> = serde_json::from_str(json).unwrap();
        assert_eq!(reply.into_result(), Err(DfsError::already_exists("/b/a.txt")));
    }
}
