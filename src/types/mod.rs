//! 类型模块：研究请求参数及其分类。
//!
//! # Types Module
//!
//! Request-side types shared by the cache key and the TTL policy.
//!
//! | Type | Description |
//! |------|-------------|
//! | [`ResearchRequest`] | Query plus every parameter that shapes the answer |
//! | [`SearchMode`] | Standard, reasoning, or deep multi-step research |
//! | [`RecencyFilter`] | Time window the search is restricted to |

pub mod request;

pub use request::{RecencyFilter, ResearchRequest, SearchMode};
