use clap::Parser;

#[derive(Debug, Parser)]
#[clap(name = "optimism", version)]
pub struct Cli {
    /// JSON value the demo store starts out holding.
    #[clap(long, default_value = r#"{"tasks":{"t1":{"title":"A","status":"todo"}}}"#)]
    pub initial: String,

    /// Dot path to overwrite, e.g. "tasks.t1.title".
    #[clap(long, default_value = "tasks.t1.title")]
    pub path: String,

    /// New value to write at `path`, as a JSON literal.
    #[clap(long, default_value = r#""B""#)]
    pub value: String,

    /// Make the simulated remote call reject instead of resolve.
    #[clap(long)]
    pub fail: bool,

    /// Re-dispatch a rejected mutation up to this many times before giving up.
    #[clap(long, default_value_t = 0)]
    pub max_retries: u32,
}
