use thiserror::Error;

/// Errors raised while configuring a flow.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FlowError {
	/// A style option is out of its accepted range.
	#[error("Invalid configuration: {message}")]
	InvalidConfiguration {
		/// What was wrong with the option.
		message: String,
	},

	/// `dir` is not one of `-1`, `0`, `1` or `"auto"`.
	#[error("Invalid direction {given:?}: expected -1, 0, 1 or \"auto\"")]
	InvalidDirection {
		/// The rejected input.
		given: String,
	},
}

impl FlowError {
	pub(crate) fn config(message: impl Into<String>) -> Self {
		Self::InvalidConfiguration {
			message: message.into(),
		}
	}
}

/// Result alias for flow configuration.
pub type FlowResult<T> = Result<T, FlowError>;
