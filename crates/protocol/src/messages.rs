//! Message types for the client, leader and node conversations

use crate::error::ProtocolError;
use crate::numbers::{format_numbers, parse_numbers};
use std::fmt;
use std::str::FromStr;

const GREETING: &str = "GREETING:";
const NUMBERS: &str = "NUMBERS:";
const DELAY: &str = "DELAY:";
const ACKNOWLEDGED: &str = "Acknowledged:";
const NUMBERS_ACCEPTED: &str = "Numbers received and acknowledged.";
const SINGLE_RESULT: &str = "SINGLE_RESULT:";
const RESULT: &str = "RESULT:";
const ERROR: &str = "ERROR:";
const READY: &str = "READY";
const CLOSE: &str = "CLOSE";
const TASK: &str = "TASK:";
const NODE_ID: &str = "NODE_ID:";
const VERIFY_SUM: &str = "VERIFY_SUM:";
const PARTIAL_SUM: &str = "Partial sum:";
const YES: &str = "YES";
const NO: &str = "NO";

/// Client to leader
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientRequest {
    /// Opening line of a session
    Greeting(String),
    /// Workload: numbers to sum and the simulated work per element
    Submit { numbers: Vec<i64>, delay_ms: u64 },
}

/// Leader to client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LeaderReply {
    /// Echo of the client's greeting
    Acknowledged(String),
    /// Workload parsed successfully
    NumbersAccepted,
    /// Sequential baseline run, for latency comparison
    SingleResult { sum: i64, elapsed_ms: u64 },
    /// Verified distributed sum
    Result(i64),
    /// Run ended without a trusted result
    Error(String),
}

/// Leader to node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeCommand {
    /// Quorum reached, a task follows
    Ready,
    /// Chunk assignment
    Task {
        numbers: Vec<i64>,
        node_id: u32,
        delay_ms: u64,
    },
    /// Recompute another node's chunk and compare with its claim
    Verify { claimed_sum: i64, numbers: Vec<i64> },
    /// Run is over
    Close,
}

/// Node to leader
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeReply {
    PartialSum(i64),
    Agree,
    Disagree,
}

fn parse_delay(raw: &str) -> Result<u64, ProtocolError> {
    let raw = raw.trim();
    let delay: i64 = raw
        .parse()
        .map_err(|_| ProtocolError::InvalidDelay(raw.to_string()))?;
    if delay < 0 {
        return Err(ProtocolError::NegativeDelay(delay));
    }
    Ok(delay as u64)
}

fn parse_sum(raw: &str) -> Result<i64, ProtocolError> {
    let raw = raw.trim();
    raw.parse()
        .map_err(|_| ProtocolError::InvalidNumber(raw.to_string()))
}

impl fmt::Display for ClientRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Greeting(text) => write!(f, "{} {}", GREETING, text),
            Self::Submit { numbers, delay_ms } => write!(
                f,
                "{} {}, {} {}",
                NUMBERS,
                format_numbers(numbers),
                DELAY,
                delay_ms
            ),
        }
    }
}

impl FromStr for ClientRequest {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let line = s.trim();

        if let Some(text) = line.strip_prefix(GREETING) {
            return Ok(Self::Greeting(text.trim().to_string()));
        }

        if let Some(rest) = line.strip_prefix(NUMBERS) {
            let (numbers, delay) = rest
                .rsplit_once(DELAY)
                .ok_or(ProtocolError::MissingField("DELAY"))?;
            return Ok(Self::Submit {
                numbers: parse_numbers(numbers)?,
                delay_ms: parse_delay(delay)?,
            });
        }

        Err(ProtocolError::UnexpectedMessage(line.to_string()))
    }
}

impl fmt::Display for LeaderReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Acknowledged(text) => write!(f, "{} {}", ACKNOWLEDGED, text),
            Self::NumbersAccepted => f.write_str(NUMBERS_ACCEPTED),
            Self::SingleResult { sum, elapsed_ms } => {
                write!(f, "{} {},{}", SINGLE_RESULT, sum, elapsed_ms)
            }
            Self::Result(sum) => write!(f, "{} {}", RESULT, sum),
            Self::Error(reason) => write!(f, "{} {}", ERROR, reason),
        }
    }
}

impl FromStr for LeaderReply {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let line = s.trim();

        if line == NUMBERS_ACCEPTED {
            return Ok(Self::NumbersAccepted);
        }
        if let Some(text) = line.strip_prefix(ACKNOWLEDGED) {
            return Ok(Self::Acknowledged(text.trim().to_string()));
        }
        if let Some(rest) = line.strip_prefix(SINGLE_RESULT) {
            let (sum, elapsed) = rest
                .split_once(',')
                .ok_or(ProtocolError::MissingField("elapsed"))?;
            let elapsed = elapsed.trim().trim_end_matches("ms").trim();
            let elapsed_ms = elapsed
                .parse()
                .map_err(|_| ProtocolError::InvalidNumber(elapsed.to_string()))?;
            return Ok(Self::SingleResult {
                sum: parse_sum(sum)?,
                elapsed_ms,
            });
        }
        if let Some(sum) = line.strip_prefix(RESULT) {
            return Ok(Self::Result(parse_sum(sum)?));
        }
        if let Some(reason) = line.strip_prefix(ERROR) {
            return Ok(Self::Error(reason.trim().to_string()));
        }

        Err(ProtocolError::UnexpectedMessage(line.to_string()))
    }
}

impl fmt::Display for NodeCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready => f.write_str(READY),
            Self::Close => f.write_str(CLOSE),
            Self::Task {
                numbers,
                node_id,
                delay_ms,
            } => {
                write!(f, "{} {} {} {}", TASK, format_numbers(numbers), NODE_ID, node_id)?;
                if *delay_ms > 0 {
                    write!(f, " {} {}", DELAY, delay_ms)?;
                }
                Ok(())
            }
            Self::Verify {
                claimed_sum,
                numbers,
            } => write!(
                f,
                "{} {}, {} {}",
                VERIFY_SUM,
                claimed_sum,
                TASK,
                format_numbers(numbers)
            ),
        }
    }
}

impl FromStr for NodeCommand {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let line = s.trim();

        match line {
            READY => return Ok(Self::Ready),
            CLOSE => return Ok(Self::Close),
            _ => {}
        }

        if let Some(rest) = line.strip_prefix(TASK) {
            let (numbers, tail) = rest
                .split_once(NODE_ID)
                .ok_or(ProtocolError::MissingField("NODE_ID"))?;
            let (node_id, delay_ms) = match tail.split_once(DELAY) {
                Some((id, delay)) => (id, parse_delay(delay)?),
                None => (tail, 0),
            };
            let node_id = node_id.trim();
            return Ok(Self::Task {
                numbers: parse_numbers(numbers)?,
                node_id: node_id
                    .parse()
                    .map_err(|_| ProtocolError::InvalidNodeId(node_id.to_string()))?,
                delay_ms,
            });
        }

        if let Some(rest) = line.strip_prefix(VERIFY_SUM) {
            let (sum, numbers) = rest
                .split_once(TASK)
                .ok_or(ProtocolError::MissingField("TASK"))?;
            let sum = sum.trim().trim_end_matches(',');
            return Ok(Self::Verify {
                claimed_sum: parse_sum(sum)?,
                numbers: parse_numbers(numbers)?,
            });
        }

        Err(ProtocolError::UnexpectedMessage(line.to_string()))
    }
}

impl fmt::Display for NodeReply {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PartialSum(sum) => write!(f, "{} {}", PARTIAL_SUM, sum),
            Self::Agree => f.write_str(YES),
            Self::Disagree => f.write_str(NO),
        }
    }
}

impl FromStr for NodeReply {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let line = s.trim();

        match line {
            YES => Ok(Self::Agree),
            NO => Ok(Self::Disagree),
            _ => match line.strip_prefix(PARTIAL_SUM) {
                Some(sum) => Ok(Self::PartialSum(parse_sum(sum)?)),
                None => Err(ProtocolError::UnexpectedMessage(line.to_string())),
            },
        }
    }
}
