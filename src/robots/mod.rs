//! robots.txt gating.
//!
//! A [`RobotsPolicy`] is derived once per host per run from the fetched
//! robots.txt (or from caller-supplied bytes via the request-robots hook)
//! and answers two questions: may this agent fetch this URL, and what
//! crawl delay does the file advertise.

mod parser;

pub use parser::RobotsPolicy;
