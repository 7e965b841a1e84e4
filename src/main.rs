mod console;

use {
    bevy::{app::ScheduleRunnerPlugin, log::LogPlugin, prelude::*},
    console::ConsolePlugin,
    server::{ServerConfig, ServerPlugin},
    std::{env, path::PathBuf, time::Duration},
};

const CONFIG_ENV: &str = "CANDY_CRAZE_CONFIG";
const DEFAULT_CONFIG_PATH: &str = "config/server.ron";

fn main() -> AppExit {
    let mut app = App::new();
    app.add_plugins((
        MinimalPlugins.set(ScheduleRunnerPlugin::run_loop(Duration::from_secs_f64(
            1.0 / 60.0,
        ))),
        LogPlugin {
            filter: "warn,candy_craze=info,\
                server=info,\
                session=debug,\
                profile_store=debug"
                .into(),
            level: bevy::log::Level::DEBUG,
            ..Default::default()
        },
    ));

    let config_path = env::var_os(CONFIG_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
    let server = match ServerConfig::load(&config_path).and_then(ServerPlugin::new) {
        Ok(server) => server,
        Err(error) => {
            error!("failed to start server: {error}");
            return AppExit::error();
        }
    };

    app.add_plugins((server, ConsolePlugin)).run()
}
