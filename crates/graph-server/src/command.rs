//! Line parsing and command execution.
//!
//! A received line is split on single spaces into tokens. The first token,
//! with any trailing comma removed, selects the command; the remaining
//! tokens are checked for arity before anything touches the graph.

use std::sync::Arc;

use crate::error::{GraphlineError, GraphlineResult};
use crate::registry::SessionRegistry;
use crate::replies;
use crate::session::Session;
use crate::store::GraphStore;
use crate::topology::Weight;

/// A parsed client command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Hi { name: String },
    Bye,
    AddNode { id: String },
    AddEdge { from: String, to: String, weight: Weight },
    RemoveNode { id: String },
    RemoveEdge { from: String, to: String },
    ShortestPath { from: String, to: String },
    CloserThan { threshold: Weight, source: String },
}

/// What the connection should do after a command ran.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Close,
}

fn tokenize(line: &str) -> Vec<&str> {
    let mut tokens: Vec<&str> = line.split(' ').collect();
    while tokens.last().is_some_and(|token| token.is_empty()) {
        tokens.pop();
    }
    tokens
}

fn malformed(reason: impl Into<String>) -> GraphlineError {
    GraphlineError::MalformedCommand(reason.into())
}

fn require(tokens: &[&str], min: usize, form: &str) -> GraphlineResult<()> {
    if tokens.len() < min {
        return Err(malformed(format!("expected `{form}`")));
    }
    Ok(())
}

fn parse_weight(token: &str) -> GraphlineResult<Weight> {
    token
        .parse::<Weight>()
        .map_err(|e| malformed(format!("invalid integer '{token}': {e}")))
}

/// Parses one protocol line into a [`Command`].
pub fn parse_command(line: &str) -> GraphlineResult<Command> {
    let tokens = tokenize(line);
    let Some(first) = tokens.first() else {
        return Err(malformed("empty line"));
    };

    match first.trim_end_matches(',') {
        "HI" => match tokens.as_slice() {
            [_, "I", "AM", name] => Ok(Command::Hi {
                name: name.to_string(),
            }),
            _ => Err(malformed("expected `HI, I AM <name>`")),
        },
        "BYE" => match tokens.as_slice() {
            [_, "MATE!"] => Ok(Command::Bye),
            _ => Err(malformed("expected `BYE MATE!`")),
        },
        "ADD" => {
            require(&tokens, 2, "ADD NODE|EDGE ...")?;
            match tokens[1] {
                "NODE" => {
                    require(&tokens, 3, "ADD NODE <id>")?;
                    Ok(Command::AddNode {
                        id: tokens[2].to_string(),
                    })
                }
                "EDGE" => {
                    require(&tokens, 5, "ADD EDGE <from> <to> <weight>")?;
                    Ok(Command::AddEdge {
                        from: tokens[2].to_string(),
                        to: tokens[3].to_string(),
                        weight: parse_weight(tokens[4])?,
                    })
                }
                other => Err(malformed(format!("unknown ADD target '{other}'"))),
            }
        }
        "REMOVE" => {
            require(&tokens, 2, "REMOVE NODE|EDGE ...")?;
            match tokens[1] {
                "NODE" => {
                    require(&tokens, 3, "REMOVE NODE <id>")?;
                    Ok(Command::RemoveNode {
                        id: tokens[2].to_string(),
                    })
                }
                "EDGE" => {
                    require(&tokens, 4, "REMOVE EDGE <from> <to>")?;
                    Ok(Command::RemoveEdge {
                        from: tokens[2].to_string(),
                        to: tokens[3].to_string(),
                    })
                }
                other => Err(malformed(format!("unknown REMOVE target '{other}'"))),
            }
        }
        "SHORTEST" => {
            require(&tokens, 4, "SHORTEST PATH <from> <to>")?;
            if tokens[1] != "PATH" {
                return Err(malformed("expected `SHORTEST PATH`"));
            }
            Ok(Command::ShortestPath {
                from: tokens[2].to_string(),
                to: tokens[3].to_string(),
            })
        }
        "CLOSER" => {
            require(&tokens, 4, "CLOSER THAN <weight> <source>")?;
            if tokens[1] != "THAN" {
                return Err(malformed("expected `CLOSER THAN`"));
            }
            Ok(Command::CloserThan {
                threshold: parse_weight(tokens[2])?,
                source: tokens[3].to_string(),
            })
        }
        other => Err(malformed(format!("unknown command '{other}'"))),
    }
}

/// Protocol line reported for a failed command.
fn error_reply(err: &GraphlineError) -> &'static str {
    match err {
        GraphlineError::NodeNotFound(_) => replies::NODE_NOT_FOUND,
        GraphlineError::AlreadyExists(_) => replies::NODE_ALREADY_EXISTS,
        _ => replies::NOT_UNDERSTOOD,
    }
}

/// Routes parsed commands to the graph and the session registry and writes
/// the replies to the session's output sink.
#[derive(Clone)]
pub struct CommandDispatcher {
    graph: Arc<GraphStore>,
    registry: Arc<SessionRegistry>,
}

impl CommandDispatcher {
    pub fn new(graph: Arc<GraphStore>, registry: Arc<SessionRegistry>) -> Self {
        Self { graph, registry }
    }

    /// Handles one received line. Never fails: every error becomes a reply.
    pub fn dispatch(&self, session: &Session, line: &str) -> Flow {
        let result = parse_command(line).and_then(|command| self.execute(session, command));
        match result {
            Ok(flow) => flow,
            Err(err) => {
                tracing::debug!(session = %session.id(), line, "command failed: {err}");
                session.send(error_reply(&err));
                Flow::Continue
            }
        }
    }

    pub fn execute(&self, session: &Session, command: Command) -> GraphlineResult<Flow> {
        match command {
            Command::Hi { name } => {
                session.set_name(&name);
                session.send(replies::named(&name));
                self.registry.unregister(&session.id());
            }
            Command::Bye => {
                let elapsed_ms = session.elapsed().as_millis();
                session.send(replies::farewell(&session.display_name(), elapsed_ms));
                self.registry.unregister(&session.id());
                return Ok(Flow::Close);
            }
            Command::AddNode { id } => {
                self.graph.add_node(&id)?;
                session.send(replies::NODE_ADDED);
            }
            Command::AddEdge { from, to, weight } => {
                self.graph.add_edge(&from, &to, weight)?;
                session.send(replies::EDGE_ADDED);
            }
            Command::RemoveNode { id } => {
                self.graph.remove_node(&id)?;
                session.send(replies::NODE_REMOVED);
            }
            Command::RemoveEdge { from, to } => {
                self.graph.remove_edge(&from, &to)?;
                session.send(replies::EDGE_REMOVED);
            }
            Command::ShortestPath { from, to } => {
                let distance = self.graph.shortest_path(&from, &to)?;
                session.send(distance.to_string());
            }
            Command::CloserThan { threshold, source } => {
                let nodes = self.graph.find_within_weight(&source, threshold)?;
                session.send(nodes.join(","));
            }
        }
        Ok(Flow::Continue)
    }
}
