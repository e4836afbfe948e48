//! Service layer: vote admission, result fan-out, and poll records.
//!
//! [`VoteService`] admits votes against the [`crate::store::TallyStore`]
//! and hands fresh tallies to the [`ResultPublisher`], which broadcasts
//! them through the [`crate::domain::TopicHub`]. [`PollService`] covers
//! poll creation and reads.

pub mod poll_service;
pub mod result_publisher;
pub mod vote_service;

pub use poll_service::PollService;
pub use result_publisher::ResultPublisher;
pub use vote_service::{VoteReceipt, VoteService};
