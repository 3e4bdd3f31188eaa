use crate::reply::Reply;
use crate::request::Request;

/// A single command handler.
pub trait Executable: Send + Sync {
    fn exec(&self, request: &Request) -> Reply;
}

impl<F> Executable for F
where
    F: Fn(&Request) -> Reply + Send + Sync,
{
    fn exec(&self, request: &Request) -> Reply {
        self(request)
    }
}
