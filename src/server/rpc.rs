// Copyright 2025 Ojima Abraham
// SPDX-License-Identifier: Apache-2.0

//! Command switchboard for already-tokenized client commands.

use tracing::{debug, info};

use crate::datastore::{Datastore, DatastoreError};
use crate::datatype::{DataConfig, DatatypeError};

const HELP: &str = "\
Commands:

    help
    about

    types
    types <datatype name> help

    datasets info
    datasets new         (returns the uuid of the new dataset's root version)

    dataset <UUID> new <datatype name> <data name> <key=value settings>...
    dataset <UUID> <data name> help

    node <UUID> lock
    node <UUID> branch   (returns the uuid of the new child version)
    node <UUID> note <text>...
    node <UUID> <data name> help
    node <UUID> <data name> <type-specific command>...

A UUID may be abbreviated to any prefix that matches a single version.
";

/// Errors from dispatching a command.
#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    #[error("empty command")]
    EmptyCommand,

    #[error("unknown command: {0:?}")]
    UnknownCommand(String),

    #[error("missing argument <{name}> for {command:?}")]
    MissingArgument { command: String, name: &'static str },

    #[error(transparent)]
    Datastore(#[from] DatastoreError),
}

impl RpcError {
    /// True when the caller sent a bad command rather than the server failing.
    pub fn is_client_error(&self) -> bool {
        match self {
            RpcError::Datastore(e) => e.is_client_error(),
            _ => true,
        }
    }
}

impl From<DatatypeError> for RpcError {
    fn from(e: DatatypeError) -> Self {
        RpcError::Datastore(DatastoreError::Datatype(e))
    }
}

/// A tokenized command.
///
/// Tokens of the form `key=value` are settings; everything else is the
/// command proper, in order. The raw token order is kept for commands that
/// take free text.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Request {
    tokens: Vec<String>,
    command: Vec<String>,
    settings: Vec<String>,
}

impl Request {
    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tokens: Vec<String> = tokens.into_iter().map(Into::into).collect();
        let (settings, command) = tokens.iter().cloned().partition(|t| t.contains('='));
        Self {
            tokens,
            command,
            settings,
        }
    }

    /// First token, e.g. `node`.
    pub fn name(&self) -> &str {
        self.command.first().map(String::as_str).unwrap_or("")
    }

    pub fn command(&self) -> &[String] {
        &self.command
    }

    fn arg(&self, i: usize, name: &'static str) -> Result<&str, RpcError> {
        self.command
            .get(i)
            .map(String::as_str)
            .ok_or_else(|| RpcError::MissingArgument {
                command: self.to_string(),
                name,
            })
    }

    /// Command tokens from `i` on.
    fn rest(&self, i: usize) -> &[String] {
        self.command.get(i..).unwrap_or(&[])
    }

    /// Every raw token after the `i`-th command token, settings included.
    fn raw_after(&self, i: usize) -> &[String] {
        self.tokens
            .iter()
            .enumerate()
            .filter(|(_, t)| !t.contains('='))
            .nth(i)
            .and_then(|(pos, _)| self.tokens.get(pos + 1..))
            .unwrap_or(&[])
    }

    pub fn settings(&self) -> Result<DataConfig, RpcError> {
        Ok(DataConfig::parse(&self.settings)?)
    }
}

impl std::fmt::Display for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.tokens.join(" "))
    }
}

/// Reply text for a command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Response {
    pub text: String,
}

impl Response {
    fn text(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// Executes commands against one open datastore.
pub struct RpcConnection<'a> {
    store: &'a Datastore,
}

impl<'a> RpcConnection<'a> {
    pub fn new(store: &'a Datastore) -> Self {
        Self { store }
    }

    /// Routes one command to the datastore or to a data instance.
    pub fn dispatch(&self, request: &Request) -> Result<Response, RpcError> {
        debug!(command = %request, "dispatching command");
        match request.name() {
            "" => Err(RpcError::EmptyCommand),
            "help" => Ok(Response::text(format!("{}\n{}", HELP, self.store.types().chart()))),
            "about" => Ok(Response::text(format!("{}\n", self.store.about()))),
            "types" => self.types(request),
            "datasets" => self.datasets(request),
            "dataset" => self.dataset(request),
            "node" => self.node(request),
            _ => Err(RpcError::UnknownCommand(request.to_string())),
        }
    }

    fn types(&self, request: &Request) -> Result<Response, RpcError> {
        match request.command() {
            [_] => Ok(Response::text(self.store.types().chart())),
            [_, name, help] if help == "help" => {
                let datatype = self
                    .store
                    .types()
                    .get(name)
                    .ok_or_else(|| DatastoreError::UnknownDatatype(name.clone()))?;
                Ok(Response::text(datatype.help()))
            }
            _ => Err(RpcError::UnknownCommand(request.to_string())),
        }
    }

    fn datasets(&self, request: &Request) -> Result<Response, RpcError> {
        match request.arg(1, "subcommand")? {
            "info" => Ok(Response::text(self.store.datasets_info_json()?)),
            "new" => {
                let (root, _) = self.store.new_dataset()?;
                Ok(Response::text(format!("New dataset created with root version {}\n", root)))
            }
            _ => Err(RpcError::UnknownCommand(request.to_string())),
        }
    }

    fn dataset(&self, request: &Request) -> Result<Response, RpcError> {
        let prefix = request.arg(1, "UUID")?;
        let uuid = self.store.matching_uuid(prefix)?;
        match request.arg(2, "subcommand")? {
            "new" => {
                let type_name = request.arg(3, "datatype name")?;
                let data_name = request.arg(4, "data name")?;
                self.store
                    .new_data(&uuid, type_name, data_name, &request.settings()?)?;
                Ok(Response::text(format!(
                    "Data {:?} [{}] added to version {}\n",
                    data_name, type_name, prefix
                )))
            }
            data_name => {
                let data = self.store.data_service_by_uuid(&uuid, data_name)?;
                match request.rest(3) {
                    [help] if help == "help" => Ok(Response::text(data.help())),
                    _ => Err(RpcError::UnknownCommand(request.to_string())),
                }
            }
        }
    }

    fn node(&self, request: &Request) -> Result<Response, RpcError> {
        let uuid = self.store.matching_uuid(request.arg(1, "UUID")?)?;
        match request.arg(2, "descriptor")? {
            "lock" => {
                self.store.lock(&uuid)?;
                Ok(Response::text(format!("Locked version {}\n", uuid)))
            }
            "branch" => {
                let child = self.store.new_version(&uuid)?;
                Ok(Response::text(child.to_string()))
            }
            "note" => {
                let note = request.raw_after(2).join(" ");
                self.store.annotate(&uuid, &note)?;
                Ok(Response::text(format!("Annotated version {}\n", uuid)))
            }
            data_name => {
                let data = self.store.data_service_by_uuid(&uuid, data_name)?;
                let command = request.rest(3);
                if command.is_empty() {
                    return Err(RpcError::MissingArgument {
                        command: request.to_string(),
                        name: "command",
                    });
                }
                if command == ["help"] {
                    return Ok(Response::text(data.help()));
                }
                let reply = data.do_rpc(command, &request.settings()?)?;
                if reply.modified {
                    self.store.save_dataset(&uuid)?;
                    info!(%uuid, data = data_name, "saved dataset after data command");
                }
                Ok(Response::text(reply.text))
            }
        }
    }
}
