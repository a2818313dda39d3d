//! nalflow - Annex B H.264 码流解码命令行工具
//!
//! 读取以 4 字节起始码分隔的 H.264 码流, 驱动解码会话,
//! 把解码帧以 rawvideo 形式写出.

mod logging;

use clap::{Parser, ValueEnum};
use std::fs::File;
use std::path::Path;
use std::process;

use nalflow_codec::SoftwareBackend;
use nalflow_core::{NalflowError, NalflowResult};
use nalflow_format::{ChunkBoundary, PipelineConfig, RawVideoWriter, run_pipeline};

#[derive(Parser, Debug)]
#[command(name = "nalflow", version, about = "Annex B H.264 码流解码工具")]
struct Cli {
    /// 输入码流路径 (Annex B, 4 字节起始码)
    #[arg(short, long)]
    input: String,

    /// 输出裸视频帧路径
    #[arg(short, long)]
    output: String,

    /// 输出像素格式 (bgra, yuv420p, nv12, gray8)
    #[arg(long = "pix-fmt")]
    pix_fmt: Option<String>,

    /// 每次读取的字节数
    #[arg(long = "chunk-size")]
    chunk_size: Option<usize>,

    /// 逐块独立扫描 (每块最后一个 NAL 单元被丢弃)
    #[arg(long = "chunk-local")]
    chunk_local: bool,

    /// 流水线配置文件 (JSON), 命令行参数优先
    #[arg(long)]
    config: Option<String>,

    /// 解码引擎
    #[arg(long, value_enum, default_value_t = Engine::Blank)]
    engine: Engine,

    /// 打印生效的配置后退出
    #[arg(long = "print-config")]
    print_config: bool,

    /// 覆盖输出文件
    #[arg(short = 'y', long)]
    overwrite: bool,

    /// 日志级别 (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum Engine {
    /// 不解码, 为每帧输出黑色图像
    Blank,
    /// OpenH264 软件解码 (需启用 openh264 特性)
    Openh264,
}

fn main() {
    let cli = Cli::parse();
    logging::init("nalflow-cli", cli.verbose);

    if let Err(e) = run(&cli) {
        eprintln!("错误: {e}");
        process::exit(1);
    }
}

fn run(cli: &Cli) -> NalflowResult<()> {
    let config = build_config(cli)?;
    if cli.print_config {
        println!("{}", config.to_json_string()?);
        return Ok(());
    }

    if !cli.overwrite && Path::new(&cli.output).exists() {
        return Err(NalflowError::InvalidArgument(format!(
            "输出文件已存在 '{}', 使用 -y 覆盖",
            cli.output
        )));
    }

    let backend = create_backend(cli.engine)?;
    let input = File::open(&cli.input).map_err(|e| {
        NalflowError::InvalidArgument(format!("无法打开输入文件 '{}': {e}", cli.input))
    })?;
    let writer = RawVideoWriter::create(&cli.output)?;

    eprintln!(
        "nalflow 版本 {} -- Annex B H.264 码流解码工具",
        env!("CARGO_PKG_VERSION")
    );
    eprintln!("输入: {}", cli.input);
    eprintln!(
        "输出: {} (rawvideo, {})",
        cli.output, config.output_pixel_format
    );

    let report = run_pipeline(input, backend, writer, &config)?;
    println!("{report}");
    Ok(())
}

/// 合并配置文件与命令行参数
fn build_config(cli: &Cli) -> NalflowResult<PipelineConfig> {
    let mut config = match &cli.config {
        Some(path) => PipelineConfig::from_json_file(path)?,
        None => PipelineConfig::default(),
    };
    if let Some(pix_fmt) = &cli.pix_fmt {
        config.output_pixel_format = pix_fmt.clone();
    }
    if let Some(chunk_size) = cli.chunk_size {
        config.chunk_size = chunk_size;
    }
    if cli.chunk_local {
        config.chunk_boundary = ChunkBoundary::ChunkLocal;
    }
    config.validate()?;
    Ok(config)
}

fn create_backend(engine: Engine) -> NalflowResult<SoftwareBackend> {
    match engine {
        Engine::Blank => Ok(SoftwareBackend::blank()),
        #[cfg(feature = "openh264")]
        Engine::Openh264 => Ok(SoftwareBackend::openh264()),
        #[cfg(not(feature = "openh264"))]
        Engine::Openh264 => Err(NalflowError::Unsupported(
            "openh264 引擎未编译, 请以 --features openh264 构建".into(),
        )),
    }
}
