//! Fetch state for page data

use std::fmt::Display;
use tracing::error;

/// Outcome of one page data fetch.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum FetchState<T> {
    /// Not resolved yet
    #[default]
    Loading,
    Success(T),
    /// The fetch failed; the reason is only logged
    Failure(String),
}

impl<T> FetchState<T> {
    /// Convert a fetch result, logging failures under `what`
    pub fn from_result<E: Display>(what: &str, result: Result<T, E>) -> Self {
        match result {
            Ok(value) => Self::Success(value),
            Err(e) => {
                error!(what, error = %e, "Fetch failed");
                Self::Failure(e.to_string())
            }
        }
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failure(_))
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> FetchState<U> {
        match self {
            Self::Loading => FetchState::Loading,
            Self::Success(value) => FetchState::Success(f(value)),
            Self::Failure(reason) => FetchState::Failure(reason),
        }
    }
}

impl<T: Default> FetchState<T> {
    /// Value to display; a failure shows as empty, `None` while loading
    pub fn displayed(self) -> Option<T> {
        match self {
            Self::Loading => None,
            Self::Success(value) => Some(value),
            Self::Failure(_) => Some(T::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_displays_as_empty() {
        let state: FetchState<Vec<i32>> = FetchState::from_result("posts", Err("boom"));
        assert!(state.is_failure());
        assert_eq!(state.displayed(), Some(Vec::new()));
    }

    #[test]
    fn test_success_displays_value() {
        let state: FetchState<Vec<i32>> = FetchState::from_result::<&str>("posts", Ok(vec![1, 2]));
        assert_eq!(state.displayed(), Some(vec![1, 2]));
    }

    #[test]
    fn test_loading_displays_nothing() {
        let state: FetchState<Vec<i32>> = FetchState::default();
        assert!(state.is_loading());
        assert_eq!(state.displayed(), None);
    }

    #[test]
    fn test_map_keeps_failure() {
        let state: FetchState<i32> = FetchState::Failure("nope".to_string());
        assert_eq!(state.map(|n| n + 1), FetchState::Failure("nope".to_string()));
    }
}
