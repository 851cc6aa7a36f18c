// src/config.rs

use anyhow::{Context, Result};
use serde::Deserialize;
use std::{
    fs,
    path::{Path, PathBuf},
};
use tracing::info;

use crate::table::DEFAULT_DELIMITER;

/// Env var naming an optional YAML config file.
pub const CONFIG_ENV: &str = "ANSSCRAPER_CONFIG";

const DEFAULT_BASE_URL: &str = "https://dadosabertos.ans.gov.br/FTP/PDA/demonstracoes_contabeis/";
const DEFAULT_REGISTRY_URL: &str =
    "https://dadosabertos.ans.gov.br/FTP/PDA/operadoras_de_plano_de_saude_ativas/Relatorio_cadop.csv";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Listing root holding one directory per year.
    pub base_url: String,
    /// How many distinct quarters to consolidate.
    pub quarters: usize,
    pub delimiter: char,
    pub download_concurrency: usize,
    pub http: HttpConfig,
    /// Operator registry joined onto the consolidated rows.
    pub registry_url: String,
    pub workspace: Workspace,
    /// Remove every stage folder except `output` after a successful run.
    pub clean_intermediate: bool,
    pub report: ReportSpec,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            quarters: 3,
            delimiter: DEFAULT_DELIMITER,
            download_concurrency: 3,
            http: HttpConfig::default(),
            registry_url: DEFAULT_REGISTRY_URL.to_string(),
            workspace: Workspace::default(),
            clean_intermediate: false,
            report: ReportSpec::default(),
        }
    }
}

impl Config {
    /// Read the file named by `ANSSCRAPER_CONFIG`, or fall back to defaults.
    pub fn load() -> Result<Self> {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) => Self::from_file(Path::new(&path)),
            None => Ok(Self::default().normalized()),
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let text =
            fs::read_to_string(path).with_context(|| format!("reading config {:?}", path))?;
        let cfg = Self::from_yaml(&text).with_context(|| format!("parsing config {:?}", path))?;
        info!(path = %path.display(), "loaded config");
        Ok(cfg)
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        let cfg: Config = serde_yaml::from_str(text)?;
        Ok(cfg.normalized())
    }

    /// Listing URLs are joined relative to `base_url`, so it must end in `/`.
    fn normalized(mut self) -> Self {
        if !self.base_url.ends_with('/') {
            self.base_url.push('/');
        }
        self.download_concurrency = self.download_concurrency.max(1);
        self
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff_ms: 500,
        }
    }
}

/// Working folders, one per pipeline stage, all under `root`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Workspace {
    pub root: PathBuf,
    pub compress: PathBuf,
    pub extract: PathBuf,
    pub filtered: PathBuf,
    pub pre_processed: PathBuf,
    pub normalized: PathBuf,
    pub calculated: PathBuf,
    pub merged: PathBuf,
    pub validated: PathBuf,
    pub output: PathBuf,
}

impl Default for Workspace {
    fn default() -> Self {
        Self::under(".")
    }
}

impl Workspace {
    /// Default folder names below `root`.
    pub fn under(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            compress: "compress".into(),
            extract: "extract".into(),
            filtered: "filtered_files".into(),
            pre_processed: "pre_processed_files".into(),
            normalized: "normalized_files".into(),
            calculated: "calculated_files".into(),
            merged: "merged_files".into(),
            validated: "validated_files".into(),
            output: "output".into(),
        }
    }

    fn resolve(&self, dir: &Path) -> PathBuf {
        self.root.join(dir)
    }

    pub fn compress_dir(&self) -> PathBuf {
        self.resolve(&self.compress)
    }
    pub fn extract_dir(&self) -> PathBuf {
        self.resolve(&self.extract)
    }
    pub fn filtered_dir(&self) -> PathBuf {
        self.resolve(&self.filtered)
    }
    pub fn pre_processed_dir(&self) -> PathBuf {
        self.resolve(&self.pre_processed)
    }
    pub fn normalized_dir(&self) -> PathBuf {
        self.resolve(&self.normalized)
    }
    pub fn calculated_dir(&self) -> PathBuf {
        self.resolve(&self.calculated)
    }
    pub fn merged_dir(&self) -> PathBuf {
        self.resolve(&self.merged)
    }
    pub fn validated_dir(&self) -> PathBuf {
        self.resolve(&self.validated)
    }
    pub fn output_dir(&self) -> PathBuf {
        self.resolve(&self.output)
    }

    fn intermediate_dirs(&self) -> Vec<PathBuf> {
        vec![
            self.compress_dir(),
            self.extract_dir(),
            self.filtered_dir(),
            self.pre_processed_dir(),
            self.normalized_dir(),
            self.calculated_dir(),
            self.merged_dir(),
            self.validated_dir(),
        ]
    }

    /// Create every stage folder.
    pub fn prepare(&self) -> Result<()> {
        for d in self
            .intermediate_dirs()
            .into_iter()
            .chain(std::iter::once(self.output_dir()))
        {
            fs::create_dir_all(&d).with_context(|| format!("creating {:?}", d))?;
        }
        Ok(())
    }

    /// Remove every stage folder except `output`.
    pub fn clean_intermediate(&self) -> Result<()> {
        for d in self.intermediate_dirs() {
            if d.exists() {
                fs::remove_dir_all(&d).with_context(|| format!("removing {:?}", d))?;
            }
        }
        Ok(())
    }
}

/// Column names and values driving the consolidation.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ReportSpec {
    /// Column and value selecting the account lines to consolidate.
    pub filter_column: String,
    pub filter_value: String,
    pub date_column: String,
    pub initial_balance_column: String,
    pub final_balance_column: String,
    /// Name of the computed `final - initial` column.
    pub amount_column: String,
    pub left_key: String,
    pub right_key: String,
    pub tax_id_column: String,
    pub name_column: String,
    /// Final projection, in output order.
    pub output_columns: Vec<String>,
    pub output_file: String,
}

impl Default for ReportSpec {
    fn default() -> Self {
        Self {
            filter_column: "DESCRICAO".into(),
            filter_value: "EVENTOS/ SINISTROS CONHECIDOS OU AVISADOS  DE ASSISTÊNCIA A SAÚDE MEDICO HOSPITALAR".into(),
            date_column: "DATA".into(),
            initial_balance_column: "VL_SALDO_INICIAL".into(),
            final_balance_column: "VL_SALDO_FINAL".into(),
            amount_column: "EXPENSES".into(),
            left_key: "REG_ANS".into(),
            right_key: "REGISTRO_OPERADORA".into(),
            tax_id_column: "CNPJ".into(),
            name_column: "RAZAO_SOCIAL".into(),
            output_columns: vec![
                "CNPJ".into(),
                "RAZAO_SOCIAL".into(),
                "QUARTER".into(),
                "YEAR".into(),
                "EXPENSES".into(),
                "CNPJ_VALID".into(),
                "OBSERVATION".into(),
            ],
            output_file: "consolidated_expenses.csv".into(),
        }
    }
}
