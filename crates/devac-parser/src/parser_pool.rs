//! Thread-safe parser pool for tree-sitter parsers
//!
//! Tree-sitter parsers are not Send + Sync, so parsing runs on dedicated
//! worker threads fed through a channel. Callers block (or await via
//! `spawn_blocking`) on a response channel.

use devac_core::DevacError;
use std::path::PathBuf;
use tree_sitter::{Language, Parser};

/// Grammars this pool can parse with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grammar {
    TypeScript,
    Tsx,
    JavaScript,
    Python,
    CSharp,
}

impl Grammar {
    /// Determine the grammar from a file extension.
    pub fn from_path(path: &std::path::Path) -> Option<Self> {
        match path.extension()?.to_str()? {
            "ts" | "mts" | "cts" => Some(Grammar::TypeScript),
            "tsx" => Some(Grammar::Tsx),
            "js" | "jsx" | "mjs" | "cjs" => Some(Grammar::JavaScript),
            "py" | "pyi" => Some(Grammar::Python),
            "cs" => Some(Grammar::CSharp),
            _ => None,
        }
    }

    /// Get the tree-sitter language for this grammar.
    pub fn language(&self) -> Language {
        match self {
            Grammar::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            Grammar::Tsx => tree_sitter_typescript::LANGUAGE_TSX.into(),
            Grammar::JavaScript => tree_sitter_javascript::LANGUAGE.into(),
            Grammar::Python => tree_sitter_python::LANGUAGE.into(),
            Grammar::CSharp => tree_sitter_c_sharp::LANGUAGE.into(),
        }
    }
}

/// A parsing request sent to the pool.
#[derive(Debug)]
pub struct ParseRequest {
    pub grammar: Grammar,
    pub content: String,
    pub path: PathBuf,
}

/// A parsed tree plus the content it was parsed from.
#[derive(Debug)]
pub struct ParsedTree {
    pub tree: tree_sitter::Tree,
    pub path: PathBuf,
    pub content: String,
}

/// Internal message for the parser worker.
#[derive(Debug)]
struct WorkerRequest {
    request: ParseRequest,
    response_sender: std::sync::mpsc::Sender<devac_core::Result<ParsedTree>>,
}

/// Thread-safe parser pool.
pub struct ParserPool {
    sender: std::sync::mpsc::Sender<WorkerRequest>,
}

impl ParserPool {
    /// Create a new parser pool with the specified number of worker threads.
    pub fn new(num_workers: usize) -> Self {
        let (sender, receiver) = std::sync::mpsc::channel::<WorkerRequest>();
        let receiver = std::sync::Arc::new(std::sync::Mutex::new(receiver));

        for i in 0..num_workers {
            let receiver = receiver.clone();
            std::thread::spawn(move || {
                Self::worker_thread(i, receiver);
            });
        }

        Self { sender }
    }

    fn worker_thread(
        worker_id: usize,
        receiver: std::sync::Arc<std::sync::Mutex<std::sync::mpsc::Receiver<WorkerRequest>>>,
    ) {
        tracing::debug!("Parser worker {} started", worker_id);

        let mut parser = Parser::new();

        loop {
            let next = {
                let guard = match receiver.lock() {
                    Ok(g) => g,
                    Err(_) => break,
                };
                guard.recv()
            };
            let WorkerRequest { request, response_sender } = match next {
                Ok(req) => req,
                Err(_) => {
                    tracing::debug!("Parser worker {} shutting down", worker_id);
                    break;
                }
            };

            let language = request.grammar.language();
            if let Err(e) = parser.set_language(&language) {
                let _ = response_sender.send(Err(DevacError::Internal(format!(
                    "failed to set language: {e}"
                ))));
                continue;
            }

            let result = match parser.parse(&request.content, None) {
                Some(tree) => Ok(ParsedTree {
                    tree,
                    path: request.path,
                    content: request.content,
                }),
                None => Err(DevacError::Internal("parser produced no tree".to_string())),
            };

            if response_sender.send(result).is_err() {
                tracing::warn!("Failed to send parse result back to caller");
            }
        }
    }

    /// Parse content synchronously. Blocks the current thread until the
    /// worker responds.
    pub fn parse_blocking(&self, request: ParseRequest) -> devac_core::Result<ParsedTree> {
        let (response_sender, response_receiver) = std::sync::mpsc::channel();

        self.sender
            .send(WorkerRequest { request, response_sender })
            .map_err(|_| DevacError::Internal("parser pool is shut down".to_string()))?;

        response_receiver
            .recv()
            .map_err(|_| DevacError::Internal("parser worker died".to_string()))?
    }

    /// Parse content asynchronously via `spawn_blocking`.
    pub async fn parse(&self, request: ParseRequest) -> devac_core::Result<ParsedTree> {
        let sender = self.sender.clone();
        tokio::task::spawn_blocking(move || {
            let (response_sender, response_receiver) = std::sync::mpsc::channel();

            sender
                .send(WorkerRequest { request, response_sender })
                .map_err(|_| DevacError::Internal("parser pool is shut down".to_string()))?;

            response_receiver
                .recv()
                .map_err(|_| DevacError::Internal("parser worker died".to_string()))?
        })
        .await
        .map_err(|e| DevacError::Internal(format!("task join error: {e}")))?
    }
}

impl Clone for ParserPool {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

/// Convenience constructor sized to the machine's CPU count (min 2).
pub fn create_parser_pool() -> ParserPool {
    let num_workers = std::thread::available_parallelism()
        .map(|n| n.get().max(2))
        .unwrap_or(2);

    ParserPool::new(num_workers)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_parse_typescript() {
        let pool = create_parser_pool();
        let content = r#"
export function greet(name: string): string {
    return `hello ${name}`;
}
"#
        .to_string();

        let request = ParseRequest {
            grammar: Grammar::TypeScript,
            content,
            path: PathBuf::from("test.ts"),
        };

        let result = pool.parse(request).await.unwrap();
        assert_eq!(result.tree.root_node().kind(), "program");
    }

    #[tokio::test]
    async fn test_parse_python() {
        let pool = create_parser_pool();
        let content = "def main():\n    print('hi')\n".to_string();

        let request = ParseRequest {
            grammar: Grammar::Python,
            content,
            path: PathBuf::from("test.py"),
        };

        let result = pool.parse(request).await.unwrap();
        assert_eq!(result.tree.root_node().kind(), "module");
    }

    #[tokio::test]
    async fn test_parse_csharp() {
        let pool = create_parser_pool();
        let content = "class Program { static void Main() {} }".to_string();

        let request = ParseRequest {
            grammar: Grammar::CSharp,
            content,
            path: PathBuf::from("Program.cs"),
        };

        let result = pool.parse(request).await.unwrap();
        assert_eq!(result.tree.root_node().kind(), "compilation_unit");
    }
}
