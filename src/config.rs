use clap::Args;

use crate::extract::TaskMatcher;

// GitHub.com: https://api.github.com/graphql
// GitHub Enterprise: https://<HOST>/api/graphql
pub const DEFAULT_GRAPHQL_ENDPOINT: &str = "https://api.github.com/graphql";

/// Runtime settings shared by every subcommand. Each one can come from the
/// environment.
#[derive(Args, Clone)]
pub struct Settings {
    /// GraphQL endpoint of the GitHub instance
    #[arg(long, global = true, env = "GITHUB_ENDPOINT", default_value = DEFAULT_GRAPHQL_ENDPOINT)]
    pub endpoint: String,

    /// Token sent as the bearer credential
    #[arg(long, global = true, env = "GITHUB_TOKEN", hide_env_values = true, default_value = "")]
    pub token: String,

    /// Project code recognised in task identifiers such as `PROJ-123`
    #[arg(
        long = "task-prefix",
        global = true,
        env = "MERGE_METRICS_TASK_PREFIXES",
        value_delimiter = ','
    )]
    pub task_prefixes: Vec<String>,
}

impl Settings {
    pub fn task_matcher(&self) -> Result<TaskMatcher, regex::Error> {
        TaskMatcher::new(&self.task_prefixes)
    }
}
