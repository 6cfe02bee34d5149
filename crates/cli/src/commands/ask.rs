//! Ask command handler.
//!
//! Runs one query through the retrieval pipeline and prints the answer.

use std::io::Write;
use std::path::PathBuf;

use clap::Args;
use futures::StreamExt;
use pawtrip_core::{config::AppConfig, AppError, AppResult};
use pawtrip_llm::client_from_config;
use pawtrip_retrieval::{build_context, RetrievalOutcome, Retriever};

use super::{pipeline_config, print_json};

/// Ask a travel question
#[derive(Args, Debug)]
pub struct AskCommand {
    /// The question, e.g. "속초에 강아지랑 1박 2일 여행 가려고 해"
    pub query: Option<String>,

    /// Read the question from a file
    #[arg(short, long, conflicts_with = "query")]
    pub file: Option<PathBuf>,

    /// Print tokens as they are generated
    #[arg(long)]
    pub stream: bool,

    /// Output the answer with intent, verdicts and evidence as JSON
    #[arg(long)]
    pub json: bool,
}

impl AskCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Executing ask command");
        tracing::debug!("Ask command options: {:?}", self);

        let query = self.read_query()?;
        config.validate()?;

        let llm = client_from_config(config)?;
        let pipeline = pipeline_config(config)?;
        let retriever = Retriever::new(build_context(config, pipeline, llm)?);

        if self.stream {
            self.handle_streaming(&retriever, &query, config).await
        } else {
            let (outcome, answer) = retriever.answer_with_outcome(&query).await;
            self.emit(&outcome, &answer, config)
        }
    }

    async fn handle_streaming(&self, retriever: &Retriever, query: &str, config: &AppConfig) -> AppResult<()> {
        let (outcome, mut stream) = retriever.answer_stream(query).await;
        let mut answer = String::new();

        while let Some(part) = stream.next().await {
            if !self.json {
                print!("{}", part);
                std::io::stdout().flush().ok();
            }
            answer.push_str(&part);
        }

        if self.json {
            self.emit(&outcome, &answer, config)
        } else {
            println!();
            Ok(())
        }
    }

    fn emit(&self, outcome: &RetrievalOutcome, answer: &str, config: &AppConfig) -> AppResult<()> {
        if !self.json {
            println!("{}", answer);
            return Ok(());
        }

        print_json(&serde_json::json!({
            "answer": answer,
            "model": config.model,
            "provider": config.provider,
            "query": outcome.query,
            "categories": outcome.categories,
            "intent": outcome.intent,
            "neededCount": outcome.needed_count,
            "verdicts": outcome.verdicts,
            "evidence": outcome.bundle,
        }))
    }

    fn read_query(&self) -> AppResult<String> {
        let query = match (&self.query, &self.file) {
            (Some(query), _) => query.clone(),
            (None, Some(path)) => std::fs::read_to_string(path)?,
            (None, None) => return Err(AppError::Config("No question provided".to_string())),
        };

        let query = query.trim();
        if query.is_empty() {
            return Err(AppError::Config("Question is empty".to_string()));
        }
        Ok(query.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command(query: Option<&str>, file: Option<PathBuf>) -> AskCommand {
        AskCommand {
            query: query.map(str::to_string),
            file,
            stream: false,
            json: false,
        }
    }

    #[test]
    fn test_query_is_trimmed() {
        let cmd = command(Some("  속초 여행  "), None);
        assert_eq!(cmd.read_query().unwrap(), "속초 여행");
    }

    #[test]
    fn test_query_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("q.txt");
        std::fs::write(&path, "제주도에 고양이랑 2박 3일\n").unwrap();

        let cmd = command(None, Some(path));
        assert_eq!(cmd.read_query().unwrap(), "제주도에 고양이랑 2박 3일");
    }

    #[test]
    fn test_missing_or_blank_query() {
        assert!(matches!(command(None, None).read_query(), Err(AppError::Config(_))));
        assert!(matches!(command(Some("   "), None).read_query(), Err(AppError::Config(_))));
    }
}
