//! labsim-core: the economy simulation behind an idle AI-lab game.
//!
//! `SimEngine` is the aggregate root; everything else is a component it
//! owns or a pure function it calls.

pub mod achievement_subsystem;
pub mod bonus_subsystem;
pub mod clock;
pub mod combo_subsystem;
pub mod command;
pub mod config;
pub mod cost_model;
pub mod definitions;
pub mod deployment_subsystem;
pub mod engine;
pub mod error;
pub mod event;
pub mod ledger;
pub mod progress;
pub mod purchase_subsystem;
pub mod research_subsystem;
pub mod snapshot;
pub mod stats;
pub mod store;
pub mod training_subsystem;
pub mod types;
