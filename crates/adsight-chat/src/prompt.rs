//! Prompt text for SQL generation and answer streaming.

use chrono::NaiveDate;

use adsight_core::config::TableSchema;

/// Reply the SQL generator gives for questions outside the analytics domain.
pub const OUT_OF_DOMAIN_SENTINEL: &str = "INVALID";

/// Evidence handed to the answer streamer in place of query results when
/// the question is out of domain.
pub const OUT_OF_DOMAIN_NOTE: &str = "System note: the user's question is outside the scope of \
advertising performance data analysis. As an advertising data specialist, politely explain that \
this cannot be answered from the performance database and suggest the kind of questions you can \
help with.";

/// Evidence used when a query succeeds but returns no data rows.
pub const NO_RESULTS_MARKER: &str = "No results found.";

pub const ANSWER_SYSTEM_PROMPT: &str = "You are an advertising performance analyst.
Answer the user's question clearly and helpfully, based only on the query result provided.
Format numbers for readability and highlight the key insights.
If the query result is empty, say that no matching data was found.";

/// System instruction for turning a question into warehouse SQL.
pub fn sql_system_prompt(tables: &[TableSchema], lookback_days: u32, today: NaiveDate) -> String {
    let mut prompt = String::from(
        "You are an expert in ANSI SQL for a Presto/Trino-compatible analytics warehouse. \
         Convert the user's natural-language question into a single SQL query.\n\n",
    );

    for table in tables {
        prompt.push_str(&format!("Table: {}\n", table.name));
        let columns: Vec<String> = table
            .columns
            .iter()
            .map(|c| format!("{}({})", c.name, c.data_type))
            .chain(
                table
                    .partition_columns
                    .iter()
                    .map(|c| format!("{}({}, partition)", c.name, c.data_type)),
            )
            .collect();
        prompt.push_str(&format!("Columns: {}\n\n", columns.join(", ")));
    }

    let mut partitions: Vec<&str> = Vec::new();
    for column in tables.iter().flat_map(|t| &t.partition_columns) {
        if !partitions.contains(&column.name.as_str()) {
            partitions.push(&column.name);
        }
    }

    prompt.push_str(&format!("Today is {}.\n\n", today.format("%Y-%m-%d")));
    prompt.push_str("Rules:\n");
    prompt.push_str("- Return only the SQL query. No markdown code fences, no explanation.\n");
    if !partitions.is_empty() {
        prompt.push_str(&format!(
            "- Always constrain the partition columns ({}) in the WHERE clause.\n",
            partitions.join(", ")
        ));
    }
    prompt.push_str(&format!(
        "- If the question gives no date range, query the last {} days.\n",
        lookback_days
    ));
    if tables.len() > 1 {
        prompt.push_str(
            "- Combine tables only with UNION ALL. Do not put ORDER BY or LIMIT inside a \
             UNION ALL branch; wrap the union in a subquery and order the outer query.\n",
        );
    }
    prompt.push_str(&format!(
        "- If the question is not about advertising performance data, reply with exactly {} \
         and nothing else.\n",
        OUT_OF_DOMAIN_SENTINEL
    ));
    prompt
}

/// User turn for the answer stream.
pub fn answer_user_prompt(question: &str, evidence: &str) -> String {
    format!("Question: {}\n\nQuery result:\n{}", question, evidence)
}
