pub mod coin;
pub mod config;
pub mod economy;
pub mod game;
pub mod player;
pub mod protocol;
pub mod roster;
pub mod server;
pub mod spawn;
