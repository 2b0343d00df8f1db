use serde::{Deserialize, Serialize};

/// Треугольная сетка, полученная от сервиса конвертации CAD → mesh.
///
/// Координаты всегда в миллиметрах. Если `indices` отсутствует, каждые три
/// подряд идущие вершины образуют треугольник.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawMesh {
    pub positions: Vec<[f32; 3]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub normals: Option<Vec<[f32; 3]>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indices: Option<Vec<u32>>,
}

impl RawMesh {
    /// Сетка без индексов ("triangle soup")
    pub fn from_positions(positions: Vec<[f32; 3]>) -> Self {
        Self {
            positions,
            normals: None,
            indices: None,
        }
    }

    /// Индексированная сетка
    pub fn indexed(positions: Vec<[f32; 3]>, indices: Vec<u32>) -> Self {
        Self {
            positions,
            normals: None,
            indices: Some(indices),
        }
    }

    pub fn with_normals(mut self, normals: Vec<[f32; 3]>) -> Self {
        self.normals = Some(normals);
        self
    }

    /// Количество треугольников
    pub fn triangle_count(&self) -> usize {
        match &self.indices {
            Some(idx) => idx.len() / 3,
            None => self.positions.len() / 3,
        }
    }
}

/// Формат исходного файла
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    Stl,
    Step,
    Iges,
    Brep,
}

impl FileKind {
    /// Определить формат по расширению файла
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "stl" => Some(FileKind::Stl),
            "step" | "stp" => Some(FileKind::Step),
            "iges" | "igs" => Some(FileKind::Iges),
            "brep" => Some(FileKind::Brep),
            _ => None,
        }
    }

    /// Требуется ли тесселяция CAD-ядром
    pub fn is_cad(&self) -> bool {
        !matches!(self, FileKind::Stl)
    }
}

/// Запрос к сервису конвертации
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionRequest {
    pub id: String,
    pub kind: FileKind,
    #[serde(skip)]
    pub bytes: Vec<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub linear_deflection: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub angular_deflection: Option<f64>,
}

/// Единицы отображения
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Units {
    #[default]
    Millimeters,
    Centimeters,
    Meters,
    Inches,
}

impl Units {
    pub fn abbrev(&self) -> &'static str {
        match self {
            Units::Millimeters => "mm",
            Units::Centimeters => "cm",
            Units::Meters => "m",
            Units::Inches => "in",
        }
    }

    /// Сколько миллиметров в одной единице
    pub fn to_mm(&self) -> f64 {
        match self {
            Units::Millimeters => 1.0,
            Units::Centimeters => 10.0,
            Units::Meters => 1000.0,
            Units::Inches => 25.4,
        }
    }

    /// Перевести значение из миллиметров в эти единицы
    pub fn from_mm(&self, value_mm: f64) -> f64 {
        value_mm / self.to_mm()
    }

    pub fn all() -> &'static [Units] {
        &[Units::Millimeters, Units::Centimeters, Units::Meters, Units::Inches]
    }
}

/// Предустановленный вид камеры
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewPreset {
    Top,
    Bottom,
    Front,
    Back,
    Right,
    Left,
    Iso,
}

impl ViewPreset {
    /// Направление от цели к камере (не нормировано)
    pub fn direction(&self) -> [f32; 3] {
        match self {
            ViewPreset::Top => [0.0, 1.0, 0.0],
            ViewPreset::Bottom => [0.0, -1.0, 0.0],
            ViewPreset::Front => [0.0, 0.0, 1.0],
            ViewPreset::Back => [0.0, 0.0, -1.0],
            ViewPreset::Right => [1.0, 0.0, 0.0],
            ViewPreset::Left => [-1.0, 0.0, 0.0],
            ViewPreset::Iso => [1.0, 0.6, 1.0],
        }
    }

    pub fn all() -> &'static [ViewPreset] {
        &[
            ViewPreset::Top,
            ViewPreset::Front,
            ViewPreset::Right,
            ViewPreset::Iso,
            ViewPreset::Bottom,
            ViewPreset::Left,
            ViewPreset::Back,
        ]
    }
}

/// Тип проекции
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Projection {
    #[default]
    Perspective,
    Orthographic,
}
