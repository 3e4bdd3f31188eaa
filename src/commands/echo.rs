use crate::commands::executable::Executable;
use crate::reply::Reply;
use crate::request::Request;

/// Returns `message` as a bulk.
///
/// Ref: <https://redis.io/docs/latest/commands/echo>
#[derive(Debug, Default)]
pub struct Echo;

impl Executable for Echo {
    fn exec(&self, request: &Request) -> Reply {
        match &request.arguments[..] {
            [message] => Reply::bulk(message.clone()),
            _ => Reply::wrong_arity(&request.command),
        }
    }
}
