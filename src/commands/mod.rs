pub mod echo;
pub mod executable;
pub mod ping;

use std::collections::HashMap;
use std::fmt;
use tracing::debug;

use crate::commands::executable::Executable;
use crate::reply::Reply;
use crate::request::Request;

use echo::Echo;
use ping::Ping;

/// Maps a decoded request to its reply.
///
/// The dispatcher owns every bit of command semantics and state. It is shared by all connections,
/// so it only gets `&self`; errors while processing a command are expressed as
/// [`Reply::Error`].
pub trait Dispatcher: Send + Sync {
    fn dispatch(&self, request: &Request) -> Reply;
}

/// A dispatcher backed by a table from command name to handler.
///
/// Names are matched ASCII case-insensitively. Requests for a name that isn't registered get an
/// unknown command error.
pub struct CommandTable {
    handlers: HashMap<String, Box<dyn Executable>>,
}

impl CommandTable {
    /// An empty table, every request is answered with an unknown command error.
    pub fn new() -> CommandTable {
        CommandTable {
            handlers: HashMap::new(),
        }
    }

    /// Registers `handler` for `name`, replacing any handler previously registered for it.
    pub fn register(&mut self, name: &str, handler: impl Executable + 'static) -> &mut Self {
        self.handlers
            .insert(name.to_ascii_uppercase(), Box::new(handler));
        self
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(&name.to_ascii_uppercase())
    }
}

impl Default for CommandTable {
    /// A table with the connection level commands, `PING` and `ECHO`.
    fn default() -> Self {
        let mut table = CommandTable::new();
        table.register("PING", Ping).register("ECHO", Echo);
        table
    }
}

impl fmt::Debug for CommandTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.handlers.keys().collect();
        names.sort();
        f.debug_struct("CommandTable")
            .field("commands", &names)
            .finish()
    }
}

impl Dispatcher for CommandTable {
    fn dispatch(&self, request: &Request) -> Reply {
        match self.handlers.get(&request.command.to_ascii_uppercase()) {
            Some(handler) => handler.exec(request),
            None => {
                debug!(command = %request.command, "unknown command");
                Reply::unknown_command(&request.command)
            }
        }
    }
}
