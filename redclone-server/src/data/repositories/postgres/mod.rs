pub(crate) mod post_repository;
pub(crate) mod reset_token_repository;
pub(crate) mod user_repository;
pub(crate) mod vote_ledger;
