pub mod commit;
pub mod issue;
pub mod pull_request;
pub mod search;
