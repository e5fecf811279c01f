pub mod auth;
pub mod households;
pub mod invitations;
pub mod rooms;
pub mod scheduler;
pub mod chores;
pub mod background_jobs;
