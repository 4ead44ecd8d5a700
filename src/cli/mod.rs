//! CLI 모듈
//!
//! citerag CLI 명령어 정의 및 구현

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};

use crate::collector::{CollectionStats, FileCollector};
use crate::config::{RagConfig, RebuildMode};
use crate::embedding::{create_embedder, has_api_key, resolve_model_dir, EmbedderKind};
use crate::knowledge::{format_context, FileOutcome, KnowledgeStore};

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Parser)]
#[command(name = "citerag")]
#[command(version, about = "출처 인용 RAG 검색 엔진", long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// 모든 명령어에 공통인 설정 플래그 (환경변수보다 우선)
#[derive(Args, Debug, Default)]
pub struct GlobalArgs {
    /// 저장소 디렉토리
    #[arg(long, global = true)]
    pub storage_dir: Option<PathBuf>,

    /// 임베딩 프로바이더 (minilm | hashing | openai)
    #[arg(long, global = true)]
    pub embedder: Option<EmbedderKind>,

    /// 최대 청크 크기 (문자 수)
    #[arg(long, global = true)]
    pub chunk_size: Option<usize>,

    /// 청크 오버랩 (문자 수)
    #[arg(long, global = true)]
    pub chunk_overlap: Option<usize>,

    /// 인덱스 갱신 방식 (full | append)
    #[arg(long, global = true)]
    pub rebuild: Option<RebuildMode>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 파일 또는 폴더를 지식베이스에 추가
    Ingest {
        /// 수집할 파일/폴더 경로 (폴더는 재귀)
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// 지식베이스 검색
    Query {
        /// 검색 쿼리
        query: String,

        /// 결과 개수
        #[arg(short)]
        k: Option<usize>,

        /// JSON으로 출력
        #[arg(long)]
        json: bool,
    },

    /// 인용 헤더가 붙은 컨텍스트 블록 출력
    Context {
        /// 검색 쿼리
        query: String,

        /// 결과 개수
        #[arg(short)]
        k: Option<usize>,
    },

    /// 상태 확인
    Status,
}

// ============================================================================
// CLI Runner
// ============================================================================

/// CLI 명령어 실행
pub async fn run(cli: Cli) -> Result<()> {
    let config = build_config(&cli.global)?;

    match cli.command {
        Commands::Ingest { paths } => cmd_ingest(config, &paths).await,
        Commands::Query { query, k, json } => cmd_query(config, &query, k, json).await,
        Commands::Context { query, k } => cmd_context(config, &query, k).await,
        Commands::Status => cmd_status(config),
    }
}

/// 환경변수 설정 위에 CLI 플래그를 덮어씀
fn build_config(args: &GlobalArgs) -> Result<RagConfig> {
    let mut config = RagConfig::from_env().context("환경변수 설정 오류")?;

    if let Some(ref dir) = args.storage_dir {
        config.storage_dir = dir.clone();
    }
    if let Some(kind) = args.embedder {
        config.embedder = kind;
    }
    if let Some(size) = args.chunk_size {
        config.chunk.chunk_size = size;
    }
    if let Some(overlap) = args.chunk_overlap {
        config.chunk.chunk_overlap = overlap;
    }
    if let Some(mode) = args.rebuild {
        config.rebuild = mode;
    }

    config.validate().context("잘못된 설정")?;
    Ok(config)
}

/// 설정된 임베더로 저장소 열기
fn open_store(config: RagConfig) -> Result<KnowledgeStore> {
    if config.embedder == EmbedderKind::OpenAi && !has_api_key() {
        bail!(
            "API 키가 설정되지 않았습니다.\n\n\
             설정 방법:\n  \
             export OPENAI_API_KEY=your-api-key\n\n\
             또는 로컬 임베딩 사용: --embedder minilm"
        );
    }

    let embedder = create_embedder(config.embedder).context("임베더 생성 실패")?;
    KnowledgeStore::open(config, embedder).context("KnowledgeStore 열기 실패")
}

// ============================================================================
// Command Implementations
// ============================================================================

/// 문서 수집 명령어 (ingest)
async fn cmd_ingest(config: RagConfig, paths: &[PathBuf]) -> Result<()> {
    let files = FileCollector::with_defaults().collect(paths);

    if files.is_empty() {
        println!("[!] 수집할 파일이 없습니다.");
        return Ok(());
    }

    // 통계 표시
    let stats = CollectionStats::from_files(&files);
    println!("[*] 수집 대상: {} 파일", stats.total_files);
    println!(
        "    PDF: {}, DOC: {}, TXT: {}, 기타: {}",
        stats.pdf_files, stats.docx_files, stats.text_files, stats.other_files
    );
    println!("    총 크기: {}", format_bytes(stats.total_size as usize));
    println!();

    let mut store = open_store(config)?;
    let before = store.len();

    println!("[*] 추출, 청킹 및 임베딩 생성 중...");
    let report = store.ingest(&files).await.context("수집 실패")?;

    for (i, outcome) in report.files.iter().enumerate() {
        let file_name = outcome
            .path()
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("unknown");

        match outcome {
            FileOutcome::Ingested { pages, chunks, .. } => println!(
                "[{}/{}] {}... 완료 ({} 페이지, {} 청크)",
                i + 1,
                report.files.len(),
                file_name,
                pages,
                chunks
            ),
            FileOutcome::Skipped { reason, .. } => println!(
                "[{}/{}] {}... 건너뜀: {}",
                i + 1,
                report.files.len(),
                file_name,
                reason
            ),
        }
    }

    println!();
    println!(
        "[OK] 완료: 성공 {}, 건너뜀 {}",
        report.ingested_count(),
        report.skipped_count()
    );
    println!(
        "     청크: {} → {} (+{})",
        before, report.total_chunks, report.chunks_added
    );
    println!("     저장 위치: {}", store.storage_dir().display());

    Ok(())
}

/// 검색 명령어 (query)
async fn cmd_query(config: RagConfig, query: &str, k: Option<usize>, json: bool) -> Result<()> {
    let k = k.unwrap_or(config.default_k);
    let store = open_store(config)?;

    let results = store.retrieve(query, k).await.context("검색 실패")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }

    println!("[*] 검색 중: \"{}\"", query);

    if results.is_empty() {
        println!("\n[!] 검색 결과가 없습니다.");
        return Ok(());
    }

    println!("\n[OK] 검색 결과 ({} 건):\n", results.len());

    for (i, result) in results.iter().enumerate() {
        let metadata = &result.chunk.metadata;
        println!(
            "{}. [거리: {:.4}] {} (Page {})",
            i + 1,
            result.score,
            metadata.file_name,
            metadata.page_number
        );
        println!("   내용: {}", truncate_text(&result.chunk.text, 200));
        println!();
    }

    Ok(())
}

/// 컨텍스트 명령어 (context)
async fn cmd_context(config: RagConfig, query: &str, k: Option<usize>) -> Result<()> {
    let k = k.unwrap_or(config.default_k);
    let store = open_store(config)?;

    let results = store.retrieve(query, k).await.context("검색 실패")?;

    if results.is_empty() {
        println!("[!] 검색 결과가 없습니다.");
        return Ok(());
    }

    println!("{}", format_context(&results));
    Ok(())
}

/// 상태 명령어 (status)
fn cmd_status(config: RagConfig) -> Result<()> {
    println!("citerag v{}", env!("CARGO_PKG_VERSION"));
    println!();

    println!("[*] 저장소 디렉토리: {}", config.storage_dir.display());
    println!("    청크 파일: {}", config.chunks_path().display());
    println!("    인덱스 파일: {}", config.index_path().display());
    println!(
        "[*] 청킹: {} / 오버랩 {}, 갱신 방식: {:?}",
        config.chunk.chunk_size, config.chunk.chunk_overlap, config.rebuild
    );

    // API 키 상태
    match config.embedder {
        EmbedderKind::MiniLm => {
            let model_dir = resolve_model_dir();
            if model_dir.join("tokenizer.json").is_file() {
                println!("[OK] 임베더: minilm ({})", model_dir.display());
            } else {
                println!("[!] 임베더: minilm (모델 파일 없음: {})", model_dir.display());
                println!("    설정: export CITERAG_MODEL_DIR=/path/to/all-MiniLM-L6-v2");
            }
        }
        EmbedderKind::Hashing => println!("[OK] 임베더: hashing"),
        EmbedderKind::OpenAi if has_api_key() => println!("[OK] 임베더: openai (API 키 설정됨)"),
        EmbedderKind::OpenAi => {
            println!("[!] 임베더: openai (API 키 미설정)");
            println!("    설정: export OPENAI_API_KEY=your-key");
        }
    }

    let store = match open_store(config) {
        Ok(store) => store,
        Err(e) => {
            println!("[!] KnowledgeStore 열기 실패: {:#}", e);
            return Ok(());
        }
    };

    let embedder = store.embedder();
    println!("[OK] 임베딩 모델: {} (차원 {})", embedder.name(), embedder.dimension());

    let stats = store.stats();
    println!("[OK] 저장된 청크: {} 건 ({} 파일)", stats.chunk_count, stats.file_count);
    println!(
        "     벡터 인덱스: {} 벡터, 차원 {}",
        stats.vector_count, stats.dimension
    );
    for (file_type, count) in &stats.files_by_type {
        println!("     {}: {} 파일", file_type, count);
    }

    Ok(())
}

// ============================================================================
// Helper Functions
// ============================================================================

/// 텍스트 자르기 (UTF-8 안전)
fn truncate_text(text: &str, max_chars: usize) -> String {
    let cleaned = text.replace('\n', " ").replace('\r', "");
    let cleaned = cleaned.trim();

    if cleaned.chars().count() <= max_chars {
        cleaned.to_string()
    } else {
        let truncated: String = cleaned.chars().take(max_chars).collect();
        format!("{}...", truncated)
    }
}

/// 바이트 크기 포맷팅
fn format_bytes(bytes: usize) -> String {
    const KB: usize = 1024;
    const MB: usize = KB * 1024;

    if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_text() {
        assert_eq!(truncate_text("hello", 10), "hello");
        assert_eq!(truncate_text("hello world", 5), "hello...");
        assert_eq!(truncate_text("hello\nworld", 20), "hello world");
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(500), "500 B");
        assert_eq!(format_bytes(1536), "1.50 KB");
        assert_eq!(format_bytes(1048576), "1.00 MB");
    }

    #[test]
    fn test_parse_global_flags() {
        let cli = Cli::try_parse_from([
            "citerag",
            "query",
            "pump pressure",
            "-k",
            "5",
            "--embedder",
            "hashing",
            "--rebuild",
            "append",
            "--chunk-size",
            "300",
        ])
        .unwrap();

        assert_eq!(cli.global.embedder, Some(EmbedderKind::Hashing));
        assert_eq!(cli.global.rebuild, Some(RebuildMode::Append));
        assert_eq!(cli.global.chunk_size, Some(300));
        match cli.command {
            Commands::Query { query, k, json } => {
                assert_eq!(query, "pump pressure");
                assert_eq!(k, Some(5));
                assert!(!json);
            }
            _ => panic!("expected query command"),
        }
    }

    #[test]
    fn test_ingest_requires_path() {
        assert!(Cli::try_parse_from(["citerag", "ingest"]).is_err());
        assert!(Cli::try_parse_from(["citerag", "ingest", "docs/", "a.pdf"]).is_ok());
    }

    #[test]
    fn test_unknown_embedder_rejected() {
        assert!(Cli::try_parse_from(["citerag", "status", "--embedder", "word2vec"]).is_err());
    }
}
