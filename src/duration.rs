//! Work-duration estimates (`"2d 4h 30m"`).
//!
//! Durations use business time, not calendar time: a week is 5 days and a day is 8 hours.
//! The accepted syntax is broader than the arithmetic: `y`, `s` and `ms` tokens parse fine,
//! but only weeks, days, hours and minutes count towards [`Duration::to_minutes`].

#![allow(unused_assignments)] // Fields are read by miette's derive macro via attributes

use std::{fmt, iter::Sum, ops::Add, str::FromStr};

use miette::{Diagnostic, SourceSpan};

pub const MINUTES_PER_HOUR: u64 = 60;
pub const MINUTES_PER_DAY: u64 = 8 * MINUTES_PER_HOUR;
pub const MINUTES_PER_WEEK: u64 = 5 * MINUTES_PER_DAY;

/// Unit suffix of a single duration token, in the only order tokens may appear.
#[derive(Clone, Copy, Debug, Eq, Ord, PartialEq, PartialOrd, derive_more::Display)]
pub enum Unit {
	#[display("y")]
	Years,
	#[display("w")]
	Weeks,
	#[display("d")]
	Days,
	#[display("h")]
	Hours,
	#[display("m")]
	Minutes,
	#[display("s")]
	Seconds,
	#[display("ms")]
	Millis,
}

impl Unit {
	pub const ALL: [Unit; 7] = [Unit::Years, Unit::Weeks, Unit::Days, Unit::Hours, Unit::Minutes, Unit::Seconds, Unit::Millis];

	/// Minutes per one of this unit, or `None` if the unit is accepted but not summed.
	pub fn minutes(self) -> Option<u64> {
		match self {
			Unit::Weeks => Some(MINUTES_PER_WEEK),
			Unit::Days => Some(MINUTES_PER_DAY),
			Unit::Hours => Some(MINUTES_PER_HOUR),
			Unit::Minutes => Some(1),
			Unit::Years | Unit::Seconds | Unit::Millis => None,
		}
	}

	/// Strip a unit suffix off the front of `s`, returning the unit and its byte length.
	fn strip(s: &str) -> Option<(Self, usize)> {
		if s.starts_with("ms") {
			return Some((Unit::Millis, 2));
		}
		let unit = match s.chars().next()? {
			'y' => Unit::Years,
			'w' => Unit::Weeks,
			'd' => Unit::Days,
			'h' => Unit::Hours,
			'm' => Unit::Minutes,
			's' => Unit::Seconds,
			_ => return None,
		};
		Some((unit, 1))
	}
}

#[derive(Debug, Diagnostic, Eq, PartialEq, thiserror::Error)]
pub enum MalformedDuration {
	#[error("estimate is empty")]
	#[diagnostic(code(jira_bulk::duration::empty), help("use tokens like `1w 2d 4h 30m`"))]
	Empty,

	#[error("expected a number")]
	#[diagnostic(code(jira_bulk::duration::missing_amount), help("tokens are `<integer><unit>`, separated by a single space"))]
	MissingAmount {
		#[source_code]
		input: String,
		#[label("number expected here")]
		span: SourceSpan,
	},

	#[error("number is too large")]
	#[diagnostic(code(jira_bulk::duration::overflow))]
	Overflow {
		#[source_code]
		input: String,
		#[label("does not fit in 64 bits")]
		span: SourceSpan,
	},

	#[error("unknown unit")]
	#[diagnostic(code(jira_bulk::duration::unknown_unit), help("valid units are y, w, d, h, m, s, ms"))]
	UnknownUnit {
		#[source_code]
		input: String,
		#[label("expected one of y, w, d, h, m, s, ms")]
		span: SourceSpan,
	},

	#[error("unit `{unit}` is repeated or out of order")]
	#[diagnostic(code(jira_bulk::duration::out_of_order), help("units must appear at most once, in the order y w d h m s ms"))]
	OutOfOrder {
		unit: Unit,
		#[source_code]
		input: String,
		#[label("here")]
		span: SourceSpan,
	},

}

/// A decomposed work duration. Every present magnitude is non-negative by construction.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Duration {
	pub years: Option<u64>,
	pub weeks: Option<u64>,
	pub days: Option<u64>,
	pub hours: Option<u64>,
	pub minutes: Option<u64>,
	pub seconds: Option<u64>,
	pub millis: Option<u64>,
}

impl Duration {
	pub fn get(&self, unit: Unit) -> Option<u64> {
		match unit {
			Unit::Years => self.years,
			Unit::Weeks => self.weeks,
			Unit::Days => self.days,
			Unit::Hours => self.hours,
			Unit::Minutes => self.minutes,
			Unit::Seconds => self.seconds,
			Unit::Millis => self.millis,
		}
	}

	fn slot(&mut self, unit: Unit) -> &mut Option<u64> {
		match unit {
			Unit::Years => &mut self.years,
			Unit::Weeks => &mut self.weeks,
			Unit::Days => &mut self.days,
			Unit::Hours => &mut self.hours,
			Unit::Minutes => &mut self.minutes,
			Unit::Seconds => &mut self.seconds,
			Unit::Millis => &mut self.millis,
		}
	}

	pub fn is_empty(&self) -> bool {
		Unit::ALL.iter().all(|u| self.get(*u).is_none())
	}

	/// Total in business minutes: `w*2400 + d*480 + h*60 + m`. Years, seconds and millis are ignored.
	pub fn to_minutes(&self) -> u64 {
		Unit::ALL
			.iter()
			.filter_map(|u| Some(self.get(*u)?.saturating_mul(u.minutes()?)))
			.fold(0, u64::saturating_add)
	}

	/// Greedy decomposition, largest unit first. Zero-valued units are left out, so `0` gives an empty duration.
	pub fn from_minutes(total: u64) -> Self {
		let nonzero = |v: u64| (v > 0).then_some(v);
		let weeks = total / MINUTES_PER_WEEK;
		let rest = total % MINUTES_PER_WEEK;
		let days = rest / MINUTES_PER_DAY;
		let rest = rest % MINUTES_PER_DAY;
		let hours = rest / MINUTES_PER_HOUR;
		let minutes = rest % MINUTES_PER_HOUR;

		Self {
			weeks: nonzero(weeks),
			days: nonzero(days),
			hours: nonzero(hours),
			minutes: nonzero(minutes),
			..Default::default()
		}
	}

	fn from_tokens(tokens: &[Token]) -> Self {
		let mut duration = Duration::default();
		for token in tokens {
			*duration.slot(token.unit) = Some(token.amount);
		}
		duration
	}
}

#[derive(Clone, Copy, Debug)]
struct Token {
	amount: u64,
	unit: Unit,
}

/// Split `s` into `<integer><unit>` tokens, separated by at most one space, units strictly ordered.
fn tokenize(s: &str) -> Result<Vec<Token>, MalformedDuration> {
	if s.is_empty() {
		return Err(MalformedDuration::Empty);
	}

	let mut tokens: Vec<Token> = Vec::new();
	let mut pos = 0;

	loop {
		let rest = &s[pos..];
		let digits = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
		if digits == 0 {
			return Err(MalformedDuration::MissingAmount {
				input: s.to_string(),
				span: (pos, rest.chars().next().map_or(0, char::len_utf8)).into(),
			});
		}
		let amount: u64 = rest[..digits].parse().map_err(|_| MalformedDuration::Overflow {
			input: s.to_string(),
			span: (pos, digits).into(),
		})?;
		pos += digits;

		let Some((unit, unit_len)) = Unit::strip(&s[pos..]) else {
			return Err(MalformedDuration::UnknownUnit {
				input: s.to_string(),
				span: (pos, s[pos..].chars().next().map_or(0, char::len_utf8)).into(),
			});
		};
		if tokens.last().is_some_and(|last| last.unit >= unit) {
			return Err(MalformedDuration::OutOfOrder {
				unit,
				input: s.to_string(),
				span: (pos, unit_len).into(),
			});
		}
		tokens.push(Token { amount, unit });
		pos += unit_len;

		if pos == s.len() {
			break;
		}
		if s[pos..].starts_with(' ') {
			pos += 1;
		}
	}

	Ok(tokens)
}

impl FromStr for Duration {
	type Err = MalformedDuration;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		tokenize(s).map(|tokens| Self::from_tokens(&tokens))
	}
}

impl fmt::Display for Duration {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let tokens: Vec<String> = Unit::ALL.iter().filter_map(|u| self.get(*u).map(|v| format!("{v}{u}"))).collect();
		write!(f, "{}", tokens.join(" "))
	}
}

impl Add for Duration {
	type Output = Duration;

	fn add(self, rhs: Self) -> Self::Output {
		Duration::from_minutes(self.to_minutes().saturating_add(rhs.to_minutes()))
	}
}

impl Sum for Duration {
	fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
		Duration::from_minutes(iter.map(|d| d.to_minutes()).fold(0, u64::saturating_add))
	}
}

/// Render a minute total in canonical `w d h m` form. `0` renders as the empty string.
pub fn format_minutes(total: u64) -> String {
	Duration::from_minutes(total).to_string()
}
