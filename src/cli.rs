use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use comfy_table::{Cell, Table};
use dialoguer::Input;

use crate::config::{self, Options, OutputConfig, SoundcloudConfig};
use crate::core::aggregator::{Aggregator, ItemReport};
use crate::core::writer::WriteOutcome;
use crate::sources::bandcamp::BandcampClient;
use crate::sources::soundcloud::SoundcloudClient;

#[derive(Parser)]
#[command(
    name = "m3ugrab",
    about = "SoundCloud / Bandcamp URL에서 M3U 플레이리스트를 생성합니다"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// 플레이리스트를 만들 SoundCloud 또는 Bandcamp URL
    #[arg(short, long)]
    pub url: Option<String>,

    /// 플레이리스트를 저장할 디렉토리
    #[arg(short, long)]
    pub dir: Option<PathBuf>,

    /// SoundCloud API client id
    #[arg(long = "client-id", visible_alias = "id")]
    pub client_id: Option<String>,

    /// 프로필 URL이면 즐겨찾기 트랙 플레이리스트도 생성
    #[arg(short, long)]
    pub favourites: bool,

    /// 프로필 URL이면 사용자의 세트(플레이리스트)마다 플레이리스트 생성
    #[arg(short, long)]
    pub sets: bool,

    /// 상세 로그 출력
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// client id와 기본 저장 디렉토리 설정
    Config,
}

pub fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Some(Commands::Config) => cmd_config(),
        None => cmd_grab(cli),
    }
}

fn cmd_grab(cli: Cli) -> Result<()> {
    let cfg = config::load_config();
    let options = Options::merge(&cfg, cli.client_id, cli.dir, cli.favourites, cli.sets);

    let soundcloud = SoundcloudClient::new(&options.client_id)?;
    let bandcamp = BandcampClient::new()?;

    // 빈 URL은 파이프라인이 MissingUrl로 거부한다
    let url = cli.url.unwrap_or_default();
    let reports = Aggregator::new(&soundcloud, &bandcamp, &options).run(&url)?;

    print_reports(&reports);
    Ok(())
}

fn print_reports(reports: &[ItemReport]) {
    if reports.is_empty() {
        println!("처리할 항목을 찾지 못했습니다.");
        return;
    }

    let mut table = Table::new();
    table.set_header(vec!["플레이리스트", "결과"]);

    for report in reports {
        let status = match &report.result {
            Ok(WriteOutcome::Saved(path)) => format!("저장됨: {}", path.display()),
            Ok(WriteOutcome::Skipped) => "트랙 없음, 건너뜀".to_string(),
            Err(e) => format!("실패: {}", e),
        };
        table.add_row(vec![Cell::new(&report.source), Cell::new(status)]);
    }

    let (saved, skipped, failed) = tally(reports);
    println!("{table}");
    println!(
        "\n총 {} 항목 (저장: {}, 건너뜀: {}, 실패: {})",
        reports.len(),
        saved,
        skipped,
        failed
    );
}

fn tally(reports: &[ItemReport]) -> (usize, usize, usize) {
    reports
        .iter()
        .fold((0, 0, 0), |(saved, skipped, failed), r| match r.result {
            Ok(WriteOutcome::Saved(_)) => (saved + 1, skipped, failed),
            Ok(WriteOutcome::Skipped) => (saved, skipped + 1, failed),
            Err(_) => (saved, skipped, failed + 1),
        })
}

fn cmd_config() -> Result<()> {
    let mut cfg = config::load_config();

    println!("m3ugrab 설정");
    println!("(비워 두면 기본 client id와 현재 디렉토리를 사용합니다)\n");

    let current_id = cfg.soundcloud.client_id.clone().unwrap_or_default();
    let client_id: String = Input::new()
        .with_prompt("SoundCloud Client ID")
        .with_initial_text(current_id)
        .allow_empty(true)
        .interact_text()?;

    let current_dir = cfg
        .output
        .directory
        .as_ref()
        .map(|d| d.display().to_string())
        .unwrap_or_default();
    let directory: String = Input::new()
        .with_prompt("플레이리스트 저장 디렉토리")
        .with_initial_text(current_dir)
        .allow_empty(true)
        .interact_text()?;

    cfg.soundcloud = SoundcloudConfig {
        client_id: Some(client_id.trim().to_string()).filter(|s| !s.is_empty()),
    };
    cfg.output = OutputConfig {
        directory: Some(directory.trim().to_string())
            .filter(|s| !s.is_empty())
            .map(PathBuf::from),
    };

    config::save_config(&cfg)?;
    println!("\n설정이 저장되었습니다!");
    Ok(())
}
