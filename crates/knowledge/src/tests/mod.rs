//! End-to-end scenarios over a small on-disk corpus.

mod retrieval;
mod support;
