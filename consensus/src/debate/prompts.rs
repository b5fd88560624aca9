//! Prompt builders for debaters and the round critic.

use crate::extract::ExtractedAnswer;
use crate::message::ChatMessage;

const ANSWER_FORMAT: &str = "Your final answer should be a single numerical number, \
in the form \\boxed{answer}, at the end of your response.";

/// What one agent produced in the previous round, as shown to others.
#[derive(Debug, Clone, Copy)]
pub struct PeerView<'a> {
    pub answer: &'a ExtractedAnswer,
    /// Critic score, already resolved to a number.
    pub score: f64,
    pub solution: &'a str,
}

pub fn initial_prompt(question: &str) -> ChatMessage {
    ChatMessage::user(format!(
        "Can you solve the following math problem? {}\n\nExplain your reasoning. {} \
         Let's think step by step.",
        question, ANSWER_FORMAT
    ))
}

/// Plain debate turn: the other agents' latest solutions, verbatim.
pub fn debate_prompt(question: &str, others: &[&str]) -> ChatMessage {
    if others.is_empty() {
        return ChatMessage::user(format!(
            "Can you double check that your answer is correct. Please reiterate your answer. {}",
            ANSWER_FORMAT
        ));
    }

    let mut prompt = String::from("These are the solutions to the problem from other agents: ");
    for solution in others {
        prompt.push_str(&format!("\n\n One agent solution: ```{}```", solution));
    }
    prompt.push_str(&format!(
        "\n\n Using the solutions from other agents as additional information, can you provide \
         your answer to the math problem? \n The original math problem is {}. {} \
         Let's think step by step.",
        question, ANSWER_FORMAT
    ));
    ChatMessage::user(prompt)
}

/// Debate turn that compares the agent's critic score with the best peer's.
pub fn score_aware_prompt(question: &str, own: PeerView<'_>, others: &[PeerView<'_>]) -> ChatMessage {
    let best = others
        .iter()
        .copied()
        .reduce(|best, p| if p.score > best.score { p } else { best });

    let (instruction, shown) = match best {
        None => (
            format!(
                "Your score ({}/10) stands alone. Double-check your arithmetic.",
                own.score
            ),
            String::new(),
        ),
        Some(best) if own.score >= best.score => (
            format!(
                "Your score ({}/10) is the highest.\nKEEP your answer. Just double-check your \
                 arithmetic is correct.\nIf confident, output the same answer.",
                own.score
            ),
            String::new(),
        ),
        Some(best) if own.score < 5.0 || best.score - own.score >= 2.0 => (
            format!(
                "Your score ({}/10) is lower than the best ({}/10).\nStudy the highest-scoring \
                 solution below and find where your reasoning went wrong.\nAdjust your approach \
                 accordingly.",
                own.score, best.score
            ),
            format!(
                "Highest-scoring agent's solution (answer {}):\n```{}```\n",
                best.answer, best.solution
            ),
        ),
        Some(best) => (
            format!(
                "Your score ({}/10) is close to the best ({}/10).\nReview your solution for \
                 minor errors.",
                own.score, best.score
            ),
            format!(
                "Highest-scoring agent's solution (answer {}): {}\n",
                best.answer, best.solution
            ),
        ),
    };

    ChatMessage::user(format!(
        "You are participating in a multi-agent debate assisted by a critic.\nYour previous \
         reasoning and answer were: ```{}```.\n\n{}\n\n{}\nProblem: {}\n\nProvide your \
         reasoning and end with \\boxed{{answer}}.",
        own.solution, instruction, shown, question
    ))
}

/// Fresh start after a round in which the critic doubted everyone.
pub fn restart_prompt(question: &str, previous: PeerView<'_>, critic_explanation: &str) -> ChatMessage {
    ChatMessage::user(format!(
        "The critic believes your previous reasoning was not correct.\n\n\
         Your previous reasoning and answer were:\n```{}```\n\
         Your extracted answer was: {}, and the critic gave it a confidence score of {}/10.\n\n\
         Reason given by the critic: {}\n\n\
         Please restart your reasoning from scratch and independently solve the problem:\n{}\n\n\
         Do not simply repeat your previous solution; carefully re-derive the answer step by step.\n\
         End with \\boxed{{answer}}.",
        previous.solution, previous.answer, previous.score, critic_explanation, question
    ))
}

/// One critic call that scores every agent of a round.
pub fn multi_critic_prompt(question: &str, solutions: &[(&ExtractedAnswer, &str)]) -> ChatMessage {
    let blocks: Vec<String> = solutions
        .iter()
        .enumerate()
        .map(|(idx, (answer, solution))| format!("Agent {} | Answer: {}\n{}\n", idx, answer, solution))
        .collect();

    let mut distinct: Vec<&str> = Vec::new();
    for answer in solutions.iter().filter_map(|(a, _)| a.as_str()) {
        if !distinct.contains(&answer) {
            distinct.push(answer);
        }
    }
    let conflict_note = if distinct.len() > 1 {
        format!("Agents gave different answers: {}.", distinct.join(", "))
    } else {
        "All agents gave the same answer.".to_string()
    };

    let schema: Vec<String> = (0..solutions.len())
        .map(|idx| format!(r#"{{"id":{},"score":<int>,"flaw":"<specific error or none>"}}"#, idx))
        .collect();

    ChatMessage::user(format!(
        "Problem: {}\n\n{}\n\n{}\n\n\
         For each agent, verify step-by-step:\n\
         1. Is the equation setup correct for this problem?\n\
         2. Is each calculation step valid?\n\
         3. Does the final answer follow from the reasoning?\n\n\
         Scoring rules:\n\
         - 8-10: Sound logic AND likely correct answer\n\
         - 4-7: Partial errors but reasonable attempt\n\
         - 1-3: Flawed logic or wrong setup\n\n\
         STRICT RULES:\n\
         - If answers differ, at most ONE can score >= 8 (the most likely correct one)\n\
         - If ALL agents have flawed reasoning, ALL should score <= 5\n\
         - Do not give high scores just because format looks clean\n\n\
         JSON only:\n{{\"agents\":[{}]}}",
        question,
        blocks.join("\n---\n"),
        conflict_note,
        schema.join(",")
    ))
}

/// Critic call for a single agent, answered as `Confidence Score:` and `Explanation:` lines.
pub fn critic_prompt(question: &str, solution: &str) -> ChatMessage {
    ChatMessage::user(format!(
        "You are a math critic. Evaluate how sound the reasoning is and how likely the final \
         answer is correct.\n\n\
         Respond ONLY in this format:\n\
         Confidence Score: <1-10>\n\
         Explanation: <brief explanation>\n\n\
         Problem:\n{}\n\n\
         Agent's reasoning and answer:\n```{}```",
        question, solution
    ))
}

/// Label shown in place of agent `idx` during blind review: A, B, ..., Z, AA, AB, ...
pub fn candidate_label(idx: usize) -> String {
    let mut label = Vec::new();
    let mut n = idx + 1;
    while n > 0 {
        n -= 1;
        label.push(b'A' + (n % 26) as u8);
        n /= 26;
    }
    label.reverse();
    String::from_utf8_lossy(&label).into_owned()
}

/// Rubric review of anonymized candidates, one JSON object per candidate.
pub fn blind_review_prompt(question: &str, candidates: &[(String, &str)]) -> Vec<ChatMessage> {
    let mut shown = String::new();
    for (label, solution) in candidates {
        shown.push_str(&format!(
            "\n--- CANDIDATE {} ---\n{}\n-----------------------\n",
            label, solution
        ));
    }

    vec![
        ChatMessage::system(
            "You are a Blind Judge. Evaluate the following anonymous solutions based ONLY on \
             logical rigor. Do NOT consider who generated them. Look for common hallucinations.",
        ),
        ChatMessage::user(format!(
            "Original Problem:\n{}\n\nHere are the candidate solutions:\n{}\n\
             For EACH candidate, provide a JSON evaluation:\n\
             {{\n  \"candidate\": \"A\",\n  \"final_score\": <0-10>,\n  \"critique\": \"Brief summary.\"\n}}\n\
             Score variable completeness, constraint satisfaction, consistency between code and \
             narrative, and whether unit, boundary, and negation traps were caught.\n\
             Output a list of JSON objects, one for each candidate, wrapped in ```json ... ```.",
            question, shown
        )),
    ]
}

/// Follow-up turn in which an agent answers the blind reviews of its own solution.
pub fn correction_prompt(question: &str, own_solution: &str, feedback: &str) -> ChatMessage {
    ChatMessage::user(format!(
        "Original Problem: {}\n\n\
         Your Previous Solution:\n{}\n\n\
         Blind Peer Reviews:\n{}\n\n\
         Task:\n\
         1. Analyze the feedback.\n\
         2. If you were wrong, admit it and provide the CORRECTED solution.\n\
         3. If you were right, defend your logic.\n\
         4. Final answer in \\boxed{{}}.",
        question, own_solution, feedback
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::parse_multi_critic;

    fn view<'a>(answer: &'a ExtractedAnswer, score: f64, solution: &'a str) -> PeerView<'a> {
        PeerView {
            answer,
            score,
            solution,
        }
    }

    #[test]
    fn test_debate_prompt_includes_peers() {
        let msg = debate_prompt("What is 2+2?", &["I say 4", "I say 5"]);
        assert!(msg.content.contains("One agent solution: ```I say 4```"));
        assert!(msg.content.contains("One agent solution: ```I say 5```"));
        assert!(msg.content.contains("What is 2+2?"));
    }

    #[test]
    fn test_debate_prompt_without_peers() {
        let msg = debate_prompt("q", &[]);
        assert!(msg.content.starts_with("Can you double check"));
    }

    #[test]
    fn test_score_aware_branches() {
        let four = ExtractedAnswer::Value("4".into());
        let five = ExtractedAnswer::Value("5".into());

        let keep = score_aware_prompt("q", view(&four, 9.0, "mine"), &[view(&five, 6.0, "theirs")]);
        assert!(keep.content.contains("KEEP your answer"));
        assert!(!keep.content.contains("theirs"));

        let study = score_aware_prompt("q", view(&four, 3.0, "mine"), &[view(&five, 4.0, "theirs")]);
        assert!(study.content.contains("Study the highest-scoring"));
        assert!(study.content.contains("```theirs```"));

        let close = score_aware_prompt("q", view(&four, 7.0, "mine"), &[view(&five, 8.0, "theirs")]);
        assert!(close.content.contains("close to the best (8/10)"));
    }

    #[test]
    fn test_restart_prompt_mentions_missing_answer() {
        let none = ExtractedAnswer::NoAnswer;
        let msg = restart_prompt("q", view(&none, 2.0, "old work"), "setup is wrong");
        assert!(msg.content.contains("Your extracted answer was: no answer"));
        assert!(msg.content.contains("setup is wrong"));
    }

    #[test]
    fn test_candidate_labels() {
        assert_eq!(candidate_label(0), "A");
        assert_eq!(candidate_label(2), "C");
        assert_eq!(candidate_label(25), "Z");
        assert_eq!(candidate_label(26), "AA");
    }

    #[test]
    fn test_blind_review_hides_agents() {
        let messages = blind_review_prompt("q", &[("A".into(), "sol zero"), ("B".into(), "sol one")]);
        assert_eq!(messages.len(), 2);
        assert!(messages[1].content.contains("--- CANDIDATE B ---\nsol one"));
        assert!(!messages[1].content.contains("Agent 0"));
    }

    #[test]
    fn test_critic_prompt_format() {
        let msg = critic_prompt("What is 2+2?", "2+2=4 \\boxed{4}");
        assert!(msg.content.contains("Confidence Score: <1-10>"));
        assert!(msg.content.contains("```2+2=4 \\boxed{4}```"));
    }

    #[test]
    fn test_multi_critic_schema_round_trips() {
        let a = ExtractedAnswer::Value("3".into());
        let b = ExtractedAnswer::Value("4".into());
        let msg = multi_critic_prompt("q", &[(&a, "s0"), (&b, "s1")]);
        assert!(msg.content.contains("Agents gave different answers: 3, 4."));
        assert!(msg.content.contains(r#"{"id":1,"score":<int>"#));

        let reply = r#"{"agents":[{"id":0,"score":8,"flaw":"none"},{"id":1,"score":2,"flaw":"off by one"}]}"#;
        let parsed = parse_multi_critic(reply, 2);
        assert_eq!(parsed[1].explanation, "off by one");
    }
}
