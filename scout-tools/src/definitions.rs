//! Names, descriptions and input schemas of the exposed tools.

use serde::Serialize;
use serde_json::{Value, json};

pub const WEB_SEARCH: &str = "web_search";
pub const WEB_READ: &str = "web_read";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDefinition {
    pub name: &'static str,
    pub description: &'static str,
    /// JSON Schema for the arguments object.
    pub input_schema: Value,
}

pub fn tool_definitions() -> Vec<ToolDefinition> {
    vec![
        ToolDefinition {
            name: WEB_SEARCH,
            description: "Search the web and return limited results. Useful for finding current information, facts, and online resources.",
            input_schema: json!({
                "type": "object",
                "required": ["query"],
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "The search query string"
                    },
                    "limit": {
                        "type": "number",
                        "description": "Number of results to return (default: 5, min: 1, max: 20)",
                        "minimum": 1,
                        "maximum": 20
                    },
                    "time_range": {
                        "type": "string",
                        "description": "Filter results by time period: 'day', 'month', or 'year'",
                        "enum": ["day", "month", "year"]
                    },
                    "category": {
                        "type": "string",
                        "description": "Search category: 'general' (default), 'images', 'videos', 'news', 'map', 'music', 'it', 'science'"
                    },
                    "page": {
                        "type": "number",
                        "description": "Page number for pagination (default: 1)",
                        "minimum": 1
                    }
                }
            }),
        },
        ToolDefinition {
            name: WEB_READ,
            description: "Fetch and read content from a URL, converting HTML to Markdown. Useful for extracting readable text from web pages.",
            input_schema: json!({
                "type": "object",
                "required": ["url"],
                "properties": {
                    "url": {
                        "type": "string",
                        "description": "The URL to fetch and read"
                    }
                }
            }),
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn both_tools_declare_required_arguments() {
        let defs = tool_definitions();
        let names: Vec<_> = defs.iter().map(|d| d.name).collect();
        assert_eq!(names, vec![WEB_SEARCH, WEB_READ]);
        assert_eq!(defs[0].input_schema["required"], json!(["query"]));
        assert_eq!(defs[1].input_schema["required"], json!(["url"]));
        assert_eq!(
            defs[0].input_schema["properties"]["time_range"]["enum"],
            json!(["day", "month", "year"])
        );
    }
}
