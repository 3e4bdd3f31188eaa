use crate::commands::executable::Executable;
use crate::reply::Reply;
use crate::request::Request;

/// Returns PONG if no argument is provided, otherwise return a copy of the argument as a bulk.
///
/// Ref: <https://redis.io/docs/latest/commands/ping>
#[derive(Debug, Default)]
pub struct Ping;

impl Executable for Ping {
    fn exec(&self, request: &Request) -> Reply {
        match &request.arguments[..] {
            [] => Reply::Status("PONG".to_string()),
            [payload] => Reply::bulk(payload.clone()),
            _ => Reply::wrong_arity(&request.command),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::ConnectionHandle;
    use bytes::Bytes;

    #[test]
    fn without_payload() {
        let request = Request::new("PING", vec![], ConnectionHandle::default());

        assert_eq!(Ping.exec(&request), Reply::Status("PONG".to_string()));
    }

    #[test]
    fn with_payload() {
        let request = Request::new(
            "PING",
            vec![Bytes::from("hello")],
            ConnectionHandle::default(),
        );

        assert_eq!(Ping.exec(&request), Reply::bulk("hello"));
    }

    #[test]
    fn too_many_arguments() {
        let request = Request::new(
            "PING",
            vec![Bytes::from("a"), Bytes::from("b")],
            ConnectionHandle::default(),
        );

        assert_eq!(
            Ping.exec(&request),
            Reply::error("wrong number of arguments for 'ping' command")
        );
    }
}
