//! # EventHub Core
//!
//! Small set of abstractions the booking pipeline is built on.
//!
//! - **Reducer**: pure transition `(State, Action, Environment) → Result<Effects, Error>`
//! - **Effect**: a description of work for the imperative shell, never executed here
//! - **Environment**: injected dependencies such as the [`environment::Clock`]
//!
//! The shell (storage transactions, gateway calls, notifications) lives in the
//! application crate. Reducers stay free of I/O so that every transition can be
//! exercised at memory speed.
//!
//! ## Example
//!
//! ```
//! use eventhub_core::reducer::Reducer;
//! use eventhub_core::{smallvec, SmallVec};
//!
//! struct Counter;
//!
//! #[derive(Debug, PartialEq)]
//! enum Bump {
//!     Logged(u32),
//! }
//!
//! impl Reducer for Counter {
//!     type State = u32;
//!     type Action = u32;
//!     type Environment = ();
//!     type Effect = Bump;
//!     type Error = &'static str;
//!
//!     fn reduce(
//!         &self,
//!         state: &mut u32,
//!         action: u32,
//!         _env: &(),
//!     ) -> Result<SmallVec<[Bump; 4]>, Self::Error> {
//!         let next = state.checked_add(action).ok_or("overflow")?;
//!         *state = next;
//!         Ok(smallvec![Bump::Logged(next)])
//!     }
//! }
//!
//! let mut count = 1;
//! let effects = Counter.reduce(&mut count, 2, &()).unwrap();
//! assert_eq!(count, 3);
//! assert_eq!(effects.as_slice(), &[Bump::Logged(3)]);
//! ```

pub use smallvec::{smallvec, SmallVec};

/// Reducer module - the functional core.
pub mod reducer {
    use smallvec::SmallVec;

    /// A pure state transition.
    ///
    /// Contract: when `reduce` returns `Err`, `state` is left exactly as it was.
    /// Implementations validate first and mutate second.
    pub trait Reducer {
        /// The state this reducer operates on
        type State;

        /// Inputs: commands from callers and facts reported by collaborators
        type Action;

        /// Injected dependencies
        type Environment;

        /// Work the shell must perform after the transition
        type Effect;

        /// Rejection reason for an action that is not valid in the current state
        type Error;

        /// Apply `action` to `state`.
        ///
        /// # Errors
        ///
        /// Returns `Self::Error` when the action is rejected; state is unchanged.
        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            env: &Self::Environment,
        ) -> Result<SmallVec<[Self::Effect; 4]>, Self::Error>;
    }
}

/// Environment module - dependency injection traits.
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time for testability
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Wall clock.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}
