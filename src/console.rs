//! Line-based stand-in for the remote presentation layer.
//!
//! Commands typed on stdin become inbound session messages; outbound
//! messages are written to the log.

use {
    bevy::prelude::*,
    crossbeam_channel::{Receiver, TryRecvError},
    progress_components::PlayerId,
    session_events::{ClickRequested, PlayerJoined, PlayerLeft, StateUpdated, VisualRefresh},
    std::{
        io::{self, BufRead},
        str::FromStr,
        thread,
    },
    system_schedule::SessionSchedule,
    thiserror::Error,
};

pub struct ConsolePlugin;

impl Plugin for ConsolePlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Startup, spawn_stdin_reader).add_systems(
            Update,
            (
                forward_console_commands.before(SessionSchedule::Intake),
                print_outbound.after(SessionSchedule::Persist),
            ),
        );
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Join { player_id: PlayerId, username: String },
    Click { player_id: PlayerId, count: u32 },
    Leave { player_id: PlayerId },
    Quit,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConsoleParseError {
    #[error("empty command")]
    Empty,

    #[error("unknown command '{0}'")]
    Unknown(String),

    #[error("missing {0}")]
    Missing(&'static str),

    #[error("'{0}' is not a number")]
    NotANumber(String),
}

impl FromStr for ConsoleCommand {
    type Err = ConsoleParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let command = words.next().ok_or(ConsoleParseError::Empty)?;

        match command.to_ascii_lowercase().as_str() {
            "join" => {
                let player_id = parse_player_id(words.next())?;
                let username = words.collect::<Vec<_>>().join(" ");
                let username = if username.is_empty() {
                    format!("player{player_id}")
                } else {
                    username
                };
                Ok(Self::Join {
                    player_id,
                    username,
                })
            }
            "click" => {
                let player_id = parse_player_id(words.next())?;
                let count = match words.next() {
                    Some(count) => count
                        .parse()
                        .map_err(|_| ConsoleParseError::NotANumber(count.to_string()))?,
                    None => 1,
                };
                Ok(Self::Click { player_id, count })
            }
            "leave" => Ok(Self::Leave {
                player_id: parse_player_id(words.next())?,
            }),
            "quit" | "exit" => Ok(Self::Quit),
            other => Err(ConsoleParseError::Unknown(other.to_string())),
        }
    }
}

fn parse_player_id(word: Option<&str>) -> Result<PlayerId, ConsoleParseError> {
    let word = word.ok_or(ConsoleParseError::Missing("player id"))?;
    word.parse()
        .map(PlayerId)
        .map_err(|_| ConsoleParseError::NotANumber(word.to_string()))
}

#[derive(Resource)]
struct ConsoleInput(Receiver<String>);

fn spawn_stdin_reader(mut commands: Commands) {
    let (sender, receiver) = crossbeam_channel::unbounded();
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let Ok(line) = line else {
                break;
            };
            if sender.send(line).is_err() {
                break;
            }
        }
    });
    commands.insert_resource(ConsoleInput(receiver));
    info!("commands: join <id> [name] | click <id> [count] | leave <id> | quit");
}

fn forward_console_commands(
    input: Res<ConsoleInput>,
    mut joined: MessageWriter<PlayerJoined>,
    mut clicks: MessageWriter<ClickRequested>,
    mut left: MessageWriter<PlayerLeft>,
    mut exit: MessageWriter<AppExit>,
) {
    loop {
        let line = match input.0.try_recv() {
            Ok(line) => line,
            Err(TryRecvError::Empty) => break,
            Err(TryRecvError::Disconnected) => {
                info!("stdin closed, shutting down");
                exit.write(AppExit::Success);
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        match line.parse::<ConsoleCommand>() {
            Ok(ConsoleCommand::Join {
                player_id,
                username,
            }) => {
                joined.write(PlayerJoined {
                    player_id,
                    username,
                });
            }
            Ok(ConsoleCommand::Click { player_id, count }) => {
                for _ in 0..count {
                    clicks.write(ClickRequested { player_id });
                }
            }
            Ok(ConsoleCommand::Leave { player_id }) => {
                left.write(PlayerLeft { player_id });
            }
            Ok(ConsoleCommand::Quit) => {
                exit.write(AppExit::Success);
            }
            Err(error) => warn!("{error}"),
        }
    }
}

fn print_outbound(
    mut states: MessageReader<StateUpdated>,
    mut visuals: MessageReader<VisualRefresh>,
) {
    for StateUpdated {
        player_id,
        progress,
        next_level,
    } in states.read()
    {
        let next = match next_level {
            Some(next) => format!("{} clicks to next level", next.remaining),
            None => "max level".to_string(),
        };
        info!(
            "[{player_id}] {} points | candy level {} | {} per click | {next}",
            progress.current_points, progress.candy.level, progress.candy.points_per_click
        );
    }

    for VisualRefresh { player_id, level } in visuals.read() {
        info!("[{player_id}] candy shown at level {level}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_commands() {
        assert_eq!(
            "join 4 Candy Fan".parse(),
            Ok(ConsoleCommand::Join {
                player_id: PlayerId(4),
                username: "Candy Fan".to_string()
            })
        );
        assert_eq!(
            "join 4".parse(),
            Ok(ConsoleCommand::Join {
                player_id: PlayerId(4),
                username: "player4".to_string()
            })
        );
        assert_eq!(
            "CLICK 4 25".parse(),
            Ok(ConsoleCommand::Click {
                player_id: PlayerId(4),
                count: 25
            })
        );
        assert_eq!(
            "click 4".parse(),
            Ok(ConsoleCommand::Click {
                player_id: PlayerId(4),
                count: 1
            })
        );
        assert_eq!(
            "leave 4".parse(),
            Ok(ConsoleCommand::Leave {
                player_id: PlayerId(4)
            })
        );
        assert_eq!("quit".parse(), Ok(ConsoleCommand::Quit));
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!("".parse::<ConsoleCommand>(), Err(ConsoleParseError::Empty));
        assert_eq!(
            "dance 1".parse::<ConsoleCommand>(),
            Err(ConsoleParseError::Unknown("dance".to_string()))
        );
        assert_eq!(
            "click".parse::<ConsoleCommand>(),
            Err(ConsoleParseError::Missing("player id"))
        );
        assert_eq!(
            "click x".parse::<ConsoleCommand>(),
            Err(ConsoleParseError::NotANumber("x".to_string()))
        );
    }

    #[test]
    fn test_console_lines_become_messages() {
        #[derive(Resource, Default)]
        struct Seen(Vec<PlayerId>);

        let (sender, receiver) = crossbeam_channel::unbounded();
        let mut app = App::new();
        app.add_plugins(MinimalPlugins)
            .add_message::<PlayerJoined>()
            .add_message::<ClickRequested>()
            .add_message::<PlayerLeft>()
            .init_resource::<Seen>()
            .insert_resource(ConsoleInput(receiver))
            .add_systems(
                Update,
                (
                    forward_console_commands,
                    |mut clicks: MessageReader<ClickRequested>, mut seen: ResMut<Seen>| {
                        seen.0.extend(clicks.read().map(|click| click.player_id));
                    },
                )
                    .chain(),
            );

        sender.send("click 2 3".to_string()).unwrap();
        sender.send("nonsense".to_string()).unwrap();
        app.update();

        assert_eq!(app.world().resource::<Seen>().0, vec![PlayerId(2); 3]);
    }
}
