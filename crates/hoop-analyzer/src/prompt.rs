//! Prompt construction for the shot-analysis model.

/// Build the analysis prompt for a video of `duration_sec` seconds.
///
/// Mirrors the structure of the highlight-extraction prompts used elsewhere in
/// the pipeline: state the task, pin the exact output schema, then list
/// formatting constraints as a bullet list the model is told to follow
/// strictly.
pub fn build_prompt(duration_sec: u64) -> String {
    format!(
        r#"You are analyzing a basketball video that is {duration_sec} seconds long.

Identify every shot attempt in the video. For each shot attempt, report the
timestamp (in seconds from the start of the video) and whether it was a make
or a miss.

IMPORTANT: You must strictly follow this output format.
Return ONLY a single JSON array with this schema:
[
  {{
    "TimeStamp": 0,
    "Outcome": "make"
  }}
]

Additional instructions:
- Return ONLY a JSON array and nothing else, no surrounding prose.
- TimeStamp must be an integer number of seconds, 0 <= TimeStamp < {duration_sec}.
- Outcome must be one of "make", "miss", or "undetermined".
- Do not invent shots that are not visible in the video.
"#
    )
}
