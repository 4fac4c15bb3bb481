//! Final-answer formatting for terminal display.

use regex::Regex;

/// Format the final answer with line breaks and structure: numbered
/// lists get one item per line; other prose is split at sentence
/// boundaries.
pub fn format_final_answer(answer: &str) -> String {
    if answer.is_empty() {
        return answer.to_string();
    }

    let formatted = if answer.contains("1.") && answer.contains("2.") {
        format_numbered_list(answer)
    } else {
        answer
            .split(". ")
            .collect::<Vec<_>>()
            .join(".\n")
    };

    // Collapse runs of blank lines.
    let collapse = Regex::new(r"\n\s*\n").expect("static regex");
    collapse.replace_all(&formatted, "\n\n").into_owned()
}

fn format_numbered_list(answer: &str) -> String {
    let item_re = Regex::new(r"\d+\.\s*").expect("static regex");
    let mut bounds: Vec<usize> = item_re.find_iter(answer).map(|m| m.start()).collect();
    if bounds.is_empty() {
        return answer.to_string();
    }

    let mut lines: Vec<String> = Vec::new();
    let head = answer[..bounds[0]].trim();
    if !head.is_empty() {
        lines.push(head.to_string());
    }
    bounds.push(answer.len());
    for pair in bounds.windows(2) {
        let item = answer[pair[0]..pair[1]].trim();
        if !item.is_empty() {
            lines.push(item.to_string());
        }
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numbered_list_one_item_per_line() {
        let answer = "Do this: 1. restart nginx 2. check the logs 3. verify upstream";
        let formatted = format_final_answer(answer);
        let lines: Vec<&str> = formatted.lines().collect();
        assert_eq!(lines[0], "Do this:");
        assert!(lines[1].starts_with("1."));
        assert!(lines[2].starts_with("2."));
        assert!(lines[3].starts_with("3."));
    }

    #[test]
    fn test_prose_splits_at_sentences() {
        let formatted = format_final_answer("First thing. Second thing. Third");
        assert_eq!(formatted, "First thing.\nSecond thing.\nThird");
    }

    #[test]
    fn test_empty_answer_passes_through() {
        assert_eq!(format_final_answer(""), "");
    }
}
