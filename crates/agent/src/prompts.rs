//! Prompt builders for the model-backed runtime. Every prompt carries the
//! full per-root transcript so the model sees the whole life of the object
//! it supervises.

pub fn decision_prompt(transcript: &str, event_text: &str, operator_notes: &str) -> String {
    let notes = notes_section(operator_notes);
    format!(
        "You are in control of an object in a running program. For each\n\
         operation you decide whether to intercept it, report it, or halt the\n\
         program.\n\
         - If you intercept an operation, it is not executed on the underlying\n\
           object and you must provide the value returned in its place. You\n\
           will be told how that value must be formatted.\n\
         - If you do not intercept it, the operation executes normally and you\n\
           will be told its result.\n\n\
         What happened so far with this object:\n{transcript}\n\n\
         An operation is about to run on the object:\n{event_text}\n{notes}\
         Decide what to do. Answer with a single JSON object and nothing else:\n\
         {{\"should_intercept\": <bool>, \"should_report\": <bool>, \"should_halt\": <bool>}}"
    )
}

pub fn replacement_prompt(
    transcript: &str,
    event_text: &str,
    schema: Option<&str>,
    example: Option<&str>,
    operator_notes: &str,
) -> String {
    let notes = notes_section(operator_notes);
    let schema = schema.unwrap_or("No schema provided");
    let example = example.unwrap_or("No example provided");
    format!(
        "What happened so far with this object:\n{transcript}\n\n\
         You decided to intercept this operation:\n{event_text}\n{notes}\
         Provide the value to return in place of the real result, as a single\n\
         JSON value and nothing else.\n\
         The value should satisfy:\n{schema}\n\
         An example of what it could look like:\n{example}"
    )
}

pub fn acknowledge_prompt(
    transcript: &str,
    event_text: &str,
    result_text: &str,
    operator_notes: &str,
) -> String {
    let notes = notes_section(operator_notes);
    format!(
        "What happened so far with this object:\n{transcript}\n\n\
         You decided NOT to intercept this operation:\n{event_text}\n\
         The result of the operation is:\n{result_text}\n{notes}\
         Acknowledge the result and update your understanding of the object's state."
    )
}

fn notes_section(operator_notes: &str) -> String {
    if operator_notes.trim().is_empty() {
        String::new()
    } else {
        format!("\nAdditional instructions from the operator:\n{operator_notes}\n")
    }
}

#[cfg(test)]
mod tests {
    use super::decision_prompt;

    #[test]
    fn decision_prompt_frames_the_role_and_carries_the_transcript() {
        let prompt = decision_prompt("the transcript so far", "append(4)", "");
        assert!(prompt.contains("in control of an object"));
        assert!(prompt.contains("the transcript so far"));
        assert!(prompt.contains("append(4)"));
        assert!(prompt.contains("should_intercept"));
    }

    #[test]
    fn empty_operator_notes_add_nothing() {
        let prompt = decision_prompt("transcript", "event", "");
        assert!(!prompt.contains("Additional instructions"));
        let with_notes = decision_prompt("transcript", "event", "be strict");
        assert!(with_notes.contains("be strict"));
    }
}
