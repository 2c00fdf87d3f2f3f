//! CLI module - Command-line interface for the account directory
//!
//! This module provides a structured CLI using clap for argument parsing.

mod commands;

use clap::{Parser, Subcommand};

/// RMS Directory - account directory service
/// Accounts, roles and the reporting hierarchy behind the RMS back office
#[derive(Parser)]
#[command(name = "rms-directory")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP API server (default)
    #[command(alias = "web")]
    Serve,

    /// Create default config file
    #[command(alias = "--init")]
    Init,

    /// Manage accounts directly against the database
    User {
        #[command(subcommand)]
        command: UserCommands,
    },
}

#[derive(Subcommand)]
pub enum UserCommands {
    /// Provision a new account; the password is read from stdin when omitted
    Create {
        username: String,
        email: String,
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        last_name: String,
        /// One of ADMIN, MANAGER, ARTIST, EMPLOYEE
        #[arg(long, default_value = "EMPLOYEE")]
        role: String,
        /// ID of the account this one reports to
        #[arg(long)]
        manager: Option<i32>,
        #[arg(long)]
        password: Option<String>,
    },
    /// List all accounts
    #[command(alias = "ls")]
    List,
    /// Set a new password and force a change at next login
    ResetPassword {
        username: String,
        #[arg(long)]
        password: Option<String>,
    },
    /// Suspend an account without deleting it
    Deactivate { username: String },
    /// Show an account's manager chain and direct reports
    Tree { username: String },
}

pub use commands::*;
