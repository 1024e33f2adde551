//! Reads a single model response for its directive.

pub const ACTION_MARKER: &str = "Action:";
pub const ACTION_INPUT_MARKER: &str = "Action Input:";
pub const FINAL_ANSWER_MARKER: &str = "Final Answer:";
pub const OBSERVATION_MARKER: &str = "Observation:";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Action { tool: String, input: String },
    FinalAnswer(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedModelOutput;

impl std::fmt::Display for MalformedModelOutput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "neither an action nor a final answer was found")
    }
}

impl std::error::Error for MalformedModelOutput {}

/// An action wins over a final answer when both appear. Only the first
/// occurrence of each marker counts.
pub fn parse_step(response: &str) -> Result<Step, MalformedModelOutput> {
    let action = first_line_value(response, ACTION_MARKER);
    let input = first_line_value(response, ACTION_INPUT_MARKER);

    if let (Some(tool), Some(input)) = (action, input)
        && tool != "None"
        && !tool.is_empty()
    {
        return Ok(Step::Action {
            tool: tool.to_string(),
            input: input.to_string(),
        });
    }

    match response.find(FINAL_ANSWER_MARKER) {
        Some(idx) => {
            let answer = response[idx + FINAL_ANSWER_MARKER.len()..].trim();
            Ok(Step::FinalAnswer(answer.to_string()))
        }
        None => Err(MalformedModelOutput),
    }
}

/// Drops anything from the first line that starts with `Observation:`.
/// Models sometimes invent their own observation past the stop sequence.
pub fn truncate_at_observation(response: &str) -> &str {
    let mut offset = 0;
    for line in response.split_inclusive('\n') {
        if line.trim_start().starts_with(OBSERVATION_MARKER) {
            return &response[..offset];
        }
        offset += line.len();
    }
    response
}

fn first_line_value<'a>(text: &'a str, marker: &str) -> Option<&'a str> {
    text.lines()
        .find_map(|line| line.trim_start().strip_prefix(marker))
        .map(str::trim)
}
