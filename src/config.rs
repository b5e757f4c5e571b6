// Application configuration, loaded from environment variables and CLI flags.

use std::path::PathBuf;

use crate::engine::config::GameSettings;

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Port to bind the HTTP server to.
    pub port: u16,
    /// Directory containing the client bundle (HTML, script, images, audio).
    pub static_dir: PathBuf,
    /// Round length in seconds.
    pub round_seconds: u32,
    /// Maximum number of players in the session.
    pub max_players: usize,
}

impl Config {
    /// Load configuration from environment variables and CLI arguments.
    ///
    /// Environment variables:
    /// - `PORT` - HTTP server port (default: 3000)
    /// - `STATIC_DIR` - Path to the client bundle (default: `public`)
    /// - `COINRUSH_ROUND_SECONDS` - Round length (default: 60)
    /// - `COINRUSH_MAX_PLAYERS` - Session capacity (default: 4)
    ///
    /// CLI flags:
    /// - `--port <PORT>` - Override the port
    /// - `--static-dir <DIR>` - Override the client bundle directory
    pub fn load() -> Self {
        let args: Vec<String> = std::env::args().collect();
        Self::from_sources(&args, |key| std::env::var(key).ok())
    }

    fn from_sources(args: &[String], env: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = GameSettings::default();

        // Port: CLI flag --port takes precedence, then env var, then default
        let port = Self::parse_cli_value(args, "--port")
            .and_then(|v| v.parse().ok())
            .or_else(|| env("PORT").and_then(|v| v.parse().ok()))
            .unwrap_or(3000);

        let static_dir = Self::parse_cli_value(args, "--static-dir")
            .or_else(|| env("STATIC_DIR"))
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("public"));

        let round_seconds = env("COINRUSH_ROUND_SECONDS")
            .and_then(|v| v.parse().ok())
            .filter(|&s: &u32| s > 0)
            .unwrap_or(defaults.round_seconds);

        let max_players = env("COINRUSH_MAX_PLAYERS")
            .and_then(|v| v.parse().ok())
            .filter(|&n: &usize| n > 0)
            .unwrap_or(defaults.max_players);

        Config {
            port,
            static_dir,
            round_seconds,
            max_players,
        }
    }

    /// Game tuning for the session, with the configured overrides applied.
    pub fn game_settings(&self) -> GameSettings {
        GameSettings {
            round_seconds: self.round_seconds,
            max_players: self.max_players,
            ..GameSettings::default()
        }
    }

    /// Parse a CLI flag value like `--port 8080`.
    fn parse_cli_value(args: &[String], flag: &str) -> Option<String> {
        args.windows(2).find_map(|pair| {
            if pair[0] == flag {
                Some(pair[1].clone())
            } else {
                None
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_sources(&args(&["coinrush"]), |_| None);
        assert_eq!(config.port, 3000);
        assert_eq!(config.static_dir, PathBuf::from("public"));
        assert_eq!(config.round_seconds, 60);
        assert_eq!(config.max_players, 4);
    }

    #[test]
    fn test_cli_port_beats_env() {
        let env: HashMap<&str, &str> = [("PORT", "8080"), ("STATIC_DIR", "/srv/www")].into();
        let config = Config::from_sources(&args(&["coinrush", "--port", "9000"]), |k| {
            env.get(k).map(|v| v.to_string())
        });
        assert_eq!(config.port, 9000);
        assert_eq!(config.static_dir, PathBuf::from("/srv/www"));
    }

    #[test]
    fn test_game_overrides_ignore_garbage() {
        let env: HashMap<&str, &str> = [
            ("COINRUSH_ROUND_SECONDS", "90"),
            ("COINRUSH_MAX_PLAYERS", "zero"),
        ]
        .into();
        let config = Config::from_sources(&args(&["coinrush"]), |k| {
            env.get(k).map(|v| v.to_string())
        });
        let settings = config.game_settings();
        assert_eq!(settings.round_seconds, 90);
        assert_eq!(settings.max_players, 4);
        assert_eq!(settings.normal_coin_floor, 10);
    }
}
