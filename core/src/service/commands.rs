pub const FORGET_COMMAND: &str = "+forget";
pub const PROMPT_COMMAND: &str = "+prompt";

/// What an incoming message asks for. Commands may appear anywhere in the
/// text; `+forget` wins over `+prompt`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command<'a> {
    Forget,
    /// `None` just shows the active template.
    SetPrompt(Option<&'a str>),
    Ask(&'a str),
    Empty,
}

pub fn parse_command(text: &str) -> Command<'_> {
    if text.contains(FORGET_COMMAND) {
        return Command::Forget;
    }

    if let Some(idx) = text.find(PROMPT_COMMAND) {
        let template = text[idx + PROMPT_COMMAND.len()..].trim();
        return Command::SetPrompt((!template.is_empty()).then_some(template));
    }

    match text.trim() {
        "" => Command::Empty,
        question => Command::Ask(question),
    }
}
