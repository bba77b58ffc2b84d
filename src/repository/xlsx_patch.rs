// ==========================================
// 库存对账回填系统 - xlsx 包内单元格补丁
// ==========================================
// 只改写被编辑工作表 sheetData 中被寻址的单元格,其余部件按原字节复制
// 文本写为内联字符串,不改动 sharedStrings.xml;保留单元格原有样式索引
// 删除行: 移除该行,下方行号上移（与常见表格库一致,公式与合并区域不改写）
// 覆盖公式单元格或删除行后移除 calcChain.xml,由 Excel 重建
// ==========================================

use crate::domain::cell::CellValue;
use crate::repository::error::{RepositoryError, RepositoryResult};
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fs::File;
use std::io::{BufRead, Read, Write};
use std::path::Path;
use tracing::debug;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

const WORKBOOK_PART: &str = "xl/workbook.xml";
const WORKBOOK_RELS_PART: &str = "xl/_rels/workbook.xml.rels";
const CONTENT_TYPES_PART: &str = "[Content_Types].xml";
const CALC_CHAIN_PART: &str = "xl/calcChain.xml";

fn xml_error(err: impl std::fmt::Display) -> RepositoryError {
    RepositoryError::PackageError(err.to_string())
}

// ==========================================
// SheetEdits - 单个工作表的编辑记录
// ==========================================

/// 行列 0 起;单元格坐标为全部删行之后的位置
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SheetEdits {
    deleted_rows: Vec<usize>,
    cells: BTreeMap<(usize, usize), CellValue>,
}

impl SheetEdits {
    pub fn is_empty(&self) -> bool {
        self.deleted_rows.is_empty() && self.cells.is_empty()
    }

    pub fn set_cell(&mut self, row: usize, col: usize, value: CellValue) {
        self.cells.insert((row, col), value);
    }

    /// 记录删行（执行时的行号）,已记录的单元格随之上移
    pub fn delete_row(&mut self, row: usize) {
        self.cells = std::mem::take(&mut self.cells)
            .into_iter()
            .filter_map(|((r, c), value)| match r.cmp(&row) {
                std::cmp::Ordering::Less => Some(((r, c), value)),
                std::cmp::Ordering::Equal => None,
                std::cmp::Ordering::Greater => Some(((r - 1, c), value)),
            })
            .collect();
        self.deleted_rows.push(row);
    }

    /// 原始行号 → 编辑后行号;被删除返回 None
    fn map_row(&self, original: usize) -> Option<usize> {
        let mut row = original;
        for &deleted in &self.deleted_rows {
            match row.cmp(&deleted) {
                std::cmp::Ordering::Equal => return None,
                std::cmp::Ordering::Greater => row -= 1,
                std::cmp::Ordering::Less => {}
            }
        }
        Some(row)
    }

    /// 写入非空值的最大行列
    fn extent(&self) -> Option<(usize, usize)> {
        self.cells
            .iter()
            .filter(|(_, v)| **v != CellValue::Empty)
            .map(|(&(r, c), _)| (r, c))
            .reduce(|(r1, c1), (r2, c2)| (r1.max(r2), c1.max(c2)))
    }

    fn cells_by_row(&self) -> BTreeMap<usize, Vec<(usize, &CellValue)>> {
        let mut rows: BTreeMap<usize, Vec<(usize, &CellValue)>> = BTreeMap::new();
        for (&(r, c), value) in &self.cells {
            rows.entry(r).or_default().push((c, value));
        }
        rows
    }
}

// ==========================================
// 单元格地址
// ==========================================

pub fn column_letters(col: usize) -> String {
    let mut letters = Vec::new();
    let mut n = col;
    loop {
        letters.push((b'A' + (n % 26) as u8) as char);
        if n < 26 {
            break;
        }
        n = n / 26 - 1;
    }
    letters.iter().rev().collect()
}

pub fn cell_ref(row: usize, col: usize) -> String {
    format!("{}{}", column_letters(col), row + 1)
}

/// "AB12" → (11, 27)
pub fn parse_cell_ref(text: &str) -> Option<(usize, usize)> {
    let text = text.replace('$', "");
    let split = text.find(|c: char| c.is_ascii_digit())?;
    let (letters, digits) = text.split_at(split);
    if letters.is_empty() || !letters.chars().all(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    let col = letters
        .chars()
        .fold(0usize, |acc, c| acc * 26 + (c.to_ascii_uppercase() as usize - 'A' as usize + 1));
    let row: usize = digits.parse().ok()?;
    if row == 0 {
        return None;
    }
    Some((row - 1, col - 1))
}

// ==========================================
// 包级补丁
// ==========================================

/// 将各工作表的编辑应用到源包,写出到目标文件
pub fn patch_package(
    source: &Path,
    target: &Path,
    edits: &BTreeMap<String, SheetEdits>,
) -> RepositoryResult<()> {
    let mut archive = ZipArchive::new(File::open(source)?)?;
    let sheet_parts = worksheet_parts(&mut archive)?;

    let mut replaced: HashMap<String, Vec<u8>> = HashMap::new();
    let mut drop_calc_chain = false;
    for (sheet_name, sheet_edits) in edits.iter().filter(|(_, e)| !e.is_empty()) {
        let part = sheet_parts.get(sheet_name).ok_or_else(|| {
            RepositoryError::PackageError(format!("工作表{}缺少对应部件", sheet_name))
        })?;
        let original = read_part(&mut archive, part)?;
        let (patched, formula_touched) = patch_worksheet_xml(&original, sheet_edits)?;
        drop_calc_chain |= formula_touched || !sheet_edits.deleted_rows.is_empty();
        debug!(sheet = %sheet_name, part = %part, "工作表部件已改写");
        replaced.insert(part.clone(), patched);
    }

    let mut dropped: HashSet<String> = HashSet::new();
    if drop_calc_chain && archive.by_name(CALC_CHAIN_PART).is_ok() {
        dropped.insert(CALC_CHAIN_PART.to_string());
        let content_types = read_part(&mut archive, CONTENT_TYPES_PART)?;
        replaced.insert(
            CONTENT_TYPES_PART.to_string(),
            drop_empty_elements(&content_types, b"Override", |e| {
                Ok(attr_value(e, b"PartName")?.as_deref() == Some("/xl/calcChain.xml"))
            })?,
        );
        let rels = read_part(&mut archive, WORKBOOK_RELS_PART)?;
        replaced.insert(
            WORKBOOK_RELS_PART.to_string(),
            drop_empty_elements(&rels, b"Relationship", |e| {
                Ok(attr_value(e, b"Type")?.is_some_and(|t| t.ends_with("/calcChain")))
            })?,
        );
    }

    let mut zip = ZipWriter::new(File::create(target)?);
    let options = FileOptions::<()>::default().compression_method(CompressionMethod::Deflated);
    for i in 0..archive.len() {
        let file = archive.by_index_raw(i)?;
        let name = file.name().to_string();
        if dropped.contains(&name) {
            continue;
        }
        if let Some(bytes) = replaced.get(&name) {
            zip.start_file(name.clone(), options)?;
            zip.write_all(bytes)?;
        } else {
            // 未改动的部件原样复制压缩数据
            zip.raw_copy_file(file)?;
        }
    }
    zip.finish()?;
    Ok(())
}

fn read_part(archive: &mut ZipArchive<File>, name: &str) -> RepositoryResult<Vec<u8>> {
    let mut file = archive.by_name(name)?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes)?;
    Ok(bytes)
}

fn attr_value(element: &BytesStart, key: &[u8]) -> RepositoryResult<Option<String>> {
    for attr in element.attributes() {
        let attr = attr.map_err(xml_error)?;
        if attr.key.as_ref() == key {
            return Ok(Some(attr.unescape_value().map_err(xml_error)?.into_owned()));
        }
    }
    Ok(None)
}

/// 工作表名称 → 包内部件路径
fn worksheet_parts(archive: &mut ZipArchive<File>) -> RepositoryResult<HashMap<String, String>> {
    let workbook = read_part(archive, WORKBOOK_PART)?;
    let mut sheets: Vec<(String, String)> = Vec::new();
    let mut reader = Reader::from_reader(workbook.as_slice());
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf).map_err(xml_error)? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"sheet" => {
                let name = attr_value(&e, b"name")?;
                let mut rel_id = None;
                for attr in e.attributes() {
                    let attr = attr.map_err(xml_error)?;
                    if attr.key.prefix().is_some() && attr.key.local_name().as_ref() == b"id" {
                        rel_id = Some(attr.unescape_value().map_err(xml_error)?.into_owned());
                    }
                }
                if let (Some(name), Some(rel_id)) = (name, rel_id) {
                    sheets.push((name, rel_id));
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    let rels = read_part(archive, WORKBOOK_RELS_PART)?;
    let mut targets: HashMap<String, String> = HashMap::new();
    let mut reader = Reader::from_reader(rels.as_slice());
    loop {
        match reader.read_event_into(&mut buf).map_err(xml_error)? {
            Event::Start(e) | Event::Empty(e) if e.local_name().as_ref() == b"Relationship" => {
                if let (Some(id), Some(target)) =
                    (attr_value(&e, b"Id")?, attr_value(&e, b"Target")?)
                {
                    targets.insert(id, resolve_target(&target));
                }
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(sheets
        .into_iter()
        .filter_map(|(name, rel_id)| targets.get(&rel_id).map(|part| (name, part.clone())))
        .collect())
}

/// 关系目标相对于 xl/ 目录;以 / 开头为包内绝对路径
fn resolve_target(target: &str) -> String {
    match target.strip_prefix('/') {
        Some(absolute) => absolute.to_string(),
        None => format!("xl/{}", target),
    }
}

fn drop_empty_elements(
    xml: &[u8],
    element: &[u8],
    matches: impl Fn(&BytesStart) -> RepositoryResult<bool>,
) -> RepositoryResult<Vec<u8>> {
    let mut reader = Reader::from_reader(xml);
    let mut writer = Writer::new(Vec::with_capacity(xml.len()));
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf).map_err(xml_error)? {
            Event::Empty(e) if e.local_name().as_ref() == element && matches(&e)? => {}
            Event::Eof => break,
            ev => writer.write_event(ev.into_owned()).map_err(xml_error)?,
        }
        buf.clear();
    }
    Ok(writer.into_inner())
}

// ==========================================
// 工作表部件补丁
// ==========================================

struct XmlCell {
    col: usize,
    start: BytesStart<'static>,
    /// None 表示空元素 <c/>
    body: Option<Vec<Event<'static>>>,
}

impl XmlCell {
    fn has_formula(&self) -> bool {
        self.body.as_ref().is_some_and(|events| {
            events.iter().any(|ev| match ev {
                Event::Start(e) | Event::Empty(e) => e.local_name().as_ref() == b"f",
                _ => false,
            })
        })
    }
}

struct XmlRow {
    start: BytesStart<'static>,
    cells: Vec<XmlCell>,
    /// 行内的非单元格元素,按原顺序写在单元格之后
    extra: Vec<Event<'static>>,
}

/// 返回改写后的部件以及是否覆盖了公式单元格
fn patch_worksheet_xml(original: &[u8], edits: &SheetEdits) -> RepositoryResult<(Vec<u8>, bool)> {
    let mut reader = Reader::from_reader(original);
    let mut writer = Writer::new(Vec::with_capacity(original.len() + edits.cells.len() * 64));
    let mut buf = Vec::new();
    let mut formula_touched = false;

    loop {
        let event = reader.read_event_into(&mut buf).map_err(xml_error)?.into_owned();
        buf.clear();
        match event {
            Event::Empty(e) if e.local_name().as_ref() == b"dimension" => {
                let widened = widen_dimension(&e, edits)?;
                writer.write_event(Event::Empty(widened)).map_err(xml_error)?;
            }
            Event::Start(e) if e.local_name().as_ref() == b"sheetData" => {
                let rows = read_rows(&mut reader)?;
                writer.write_event(Event::Start(e)).map_err(xml_error)?;
                formula_touched |= write_rows(&mut writer, rows, edits)?;
                writer
                    .write_event(Event::End(BytesEnd::new("sheetData")))
                    .map_err(xml_error)?;
            }
            Event::Empty(e) if e.local_name().as_ref() == b"sheetData" => {
                if edits.cells.is_empty() {
                    writer.write_event(Event::Empty(e)).map_err(xml_error)?;
                } else {
                    writer.write_event(Event::Start(e)).map_err(xml_error)?;
                    write_rows(&mut writer, BTreeMap::new(), edits)?;
                    writer
                        .write_event(Event::End(BytesEnd::new("sheetData")))
                        .map_err(xml_error)?;
                }
            }
            Event::Eof => break,
            ev => writer.write_event(ev).map_err(xml_error)?,
        }
    }

    Ok((writer.into_inner(), formula_touched))
}

fn widen_dimension(element: &BytesStart, edits: &SheetEdits) -> RepositoryResult<BytesStart<'static>> {
    let Some((max_row, max_col)) = edits.extent() else {
        return Ok(element.clone().into_owned());
    };
    let Some(current) = attr_value(element, b"ref")? else {
        return Ok(element.clone().into_owned());
    };
    let (first, last) = current.split_once(':').unwrap_or((current.as_str(), current.as_str()));
    let (Some(_), Some((last_row, last_col))) = (parse_cell_ref(first), parse_cell_ref(last))
    else {
        return Ok(element.clone().into_owned());
    };
    let widened = format!(
        "{}:{}",
        first,
        cell_ref(last_row.max(max_row), last_col.max(max_col))
    );
    rewrite_attrs(element, &[("ref", widened.as_str())], &[])
}

/// 读取 sheetData 内的全部行（键为 0 起的原始行号）
fn read_rows<R: BufRead>(reader: &mut Reader<R>) -> RepositoryResult<BTreeMap<usize, XmlRow>> {
    let mut rows = BTreeMap::new();
    let mut buf = Vec::new();
    let mut next_row = 0usize;
    loop {
        let event = reader.read_event_into(&mut buf).map_err(xml_error)?.into_owned();
        buf.clear();
        match event {
            Event::Start(e) if e.local_name().as_ref() == b"row" => {
                let row = row_index(&e)?.unwrap_or(next_row);
                let (cells, extra) = read_row_children(reader)?;
                rows.insert(row, XmlRow { start: e, cells, extra });
                next_row = row + 1;
            }
            Event::Empty(e) if e.local_name().as_ref() == b"row" => {
                let row = row_index(&e)?.unwrap_or(next_row);
                rows.insert(
                    row,
                    XmlRow {
                        start: e,
                        cells: Vec::new(),
                        extra: Vec::new(),
                    },
                );
                next_row = row + 1;
            }
            Event::End(e) if e.local_name().as_ref() == b"sheetData" => return Ok(rows),
            Event::Eof => {
                return Err(RepositoryError::PackageError("sheetData 未闭合".to_string()))
            }
            _ => {}
        }
    }
}

fn row_index(element: &BytesStart) -> RepositoryResult<Option<usize>> {
    Ok(attr_value(element, b"r")?
        .and_then(|r| r.trim().parse::<usize>().ok())
        .filter(|&r| r > 0)
        .map(|r| r - 1))
}

fn read_row_children<R: BufRead>(
    reader: &mut Reader<R>,
) -> RepositoryResult<(Vec<XmlCell>, Vec<Event<'static>>)> {
    let mut cells = Vec::new();
    let mut extra = Vec::new();
    let mut buf = Vec::new();
    let mut next_col = 0usize;
    loop {
        let event = reader.read_event_into(&mut buf).map_err(xml_error)?.into_owned();
        buf.clear();
        match event {
            Event::Start(e) if e.local_name().as_ref() == b"c" => {
                let col = cell_col(&e)?.unwrap_or(next_col);
                let mut body = Vec::new();
                loop {
                    let inner = reader.read_event_into(&mut buf).map_err(xml_error)?.into_owned();
                    buf.clear();
                    match inner {
                        Event::End(end) if end.local_name().as_ref() == b"c" => break,
                        Event::Eof => {
                            return Err(RepositoryError::PackageError("单元格未闭合".to_string()))
                        }
                        ev => body.push(ev),
                    }
                }
                cells.push(XmlCell {
                    col,
                    start: e,
                    body: Some(body),
                });
                next_col = col + 1;
            }
            Event::Empty(e) if e.local_name().as_ref() == b"c" => {
                let col = cell_col(&e)?.unwrap_or(next_col);
                cells.push(XmlCell {
                    col,
                    start: e,
                    body: None,
                });
                next_col = col + 1;
            }
            Event::End(e) if e.local_name().as_ref() == b"row" => return Ok((cells, extra)),
            Event::Text(_) if extra.is_empty() => {}
            Event::Eof => return Err(RepositoryError::PackageError("行未闭合".to_string())),
            ev => extra.push(ev),
        }
    }
}

fn cell_col(element: &BytesStart) -> RepositoryResult<Option<usize>> {
    Ok(attr_value(element, b"r")?
        .and_then(|r| parse_cell_ref(&r))
        .map(|(_, col)| col))
}

/// 按编辑后的行号写出全部行;返回是否覆盖了公式单元格
fn write_rows(
    writer: &mut Writer<Vec<u8>>,
    rows: BTreeMap<usize, XmlRow>,
    edits: &SheetEdits,
) -> RepositoryResult<bool> {
    let mut formula_touched = false;
    let mut edited = edits.cells_by_row();

    let mut remapped: BTreeMap<usize, (bool, XmlRow)> = BTreeMap::new();
    for (original, row) in rows {
        if let Some(target) = edits.map_row(original) {
            remapped.insert(target, (target != original, row));
        }
    }
    for &row in edited.keys() {
        remapped.entry(row).or_insert_with(|| {
            (
                true,
                XmlRow {
                    start: BytesStart::new("row"),
                    cells: Vec::new(),
                    extra: Vec::new(),
                },
            )
        });
    }

    for (row_idx, (moved, row)) in remapped {
        let cell_edits = edited.remove(&row_idx).unwrap_or_default();
        if !moved && cell_edits.is_empty() {
            write_row_verbatim(writer, row)?;
            continue;
        }
        formula_touched |= write_row_rebuilt(writer, row_idx, row, moved, &cell_edits)?;
    }
    Ok(formula_touched)
}

fn write_row_verbatim(writer: &mut Writer<Vec<u8>>, row: XmlRow) -> RepositoryResult<()> {
    if row.cells.is_empty() && row.extra.is_empty() {
        return writer.write_event(Event::Empty(row.start)).map_err(xml_error);
    }
    let end = BytesEnd::new(String::from_utf8_lossy(row.start.name().as_ref()).into_owned());
    writer.write_event(Event::Start(row.start)).map_err(xml_error)?;
    for cell in row.cells {
        write_cell_verbatim(writer, cell)?;
    }
    for ev in row.extra {
        writer.write_event(ev).map_err(xml_error)?;
    }
    writer.write_event(Event::End(end)).map_err(xml_error)
}

fn write_cell_verbatim(writer: &mut Writer<Vec<u8>>, cell: XmlCell) -> RepositoryResult<()> {
    match cell.body {
        None => writer.write_event(Event::Empty(cell.start)).map_err(xml_error),
        Some(body) => {
            let end = BytesEnd::new(String::from_utf8_lossy(cell.start.name().as_ref()).into_owned());
            writer.write_event(Event::Start(cell.start)).map_err(xml_error)?;
            for ev in body {
                writer.write_event(ev).map_err(xml_error)?;
            }
            writer.write_event(Event::End(end)).map_err(xml_error)
        }
    }
}

fn write_row_rebuilt(
    writer: &mut Writer<Vec<u8>>,
    row_idx: usize,
    row: XmlRow,
    moved: bool,
    cell_edits: &[(usize, &CellValue)],
) -> RepositoryResult<bool> {
    let mut formula_touched = false;
    let row_number = (row_idx + 1).to_string();
    let start = rewrite_attrs(&row.start, &[("r", row_number.as_str())], &["spans"])?;

    let mut cells: BTreeMap<usize, XmlCell> =
        row.cells.into_iter().map(|cell| (cell.col, cell)).collect();

    for (col, value) in cell_edits {
        let existing = cells.remove(col);
        if let Some(cell) = &existing {
            formula_touched |= cell.has_formula();
        }
        let style = match &existing {
            Some(cell) => attr_value(&cell.start, b"s")?,
            None => None,
        };
        if existing.is_none() && **value == CellValue::Empty {
            continue;
        }
        cells.insert(*col, value_cell(row_idx, *col, style.as_deref(), value)?);
    }

    if cells.is_empty() && row.extra.is_empty() {
        writer.write_event(Event::Empty(start)).map_err(xml_error)?;
        return Ok(formula_touched);
    }
    let end = BytesEnd::new(String::from_utf8_lossy(start.name().as_ref()).into_owned());
    writer.write_event(Event::Start(start)).map_err(xml_error)?;
    for (col, cell) in cells {
        let cell = if moved {
            let reference = cell_ref(row_idx, col);
            XmlCell {
                col,
                start: rewrite_attrs(&cell.start, &[("r", reference.as_str())], &[])?,
                body: cell.body,
            }
        } else {
            cell
        };
        write_cell_verbatim(writer, cell)?;
    }
    for ev in row.extra {
        writer.write_event(ev).map_err(xml_error)?;
    }
    writer.write_event(Event::End(end)).map_err(xml_error)?;
    Ok(formula_touched)
}

/// 构造写入值的单元格（保留原样式索引）
fn value_cell(
    row: usize,
    col: usize,
    style: Option<&str>,
    value: &CellValue,
) -> RepositoryResult<XmlCell> {
    let reference = cell_ref(row, col);
    let mut start = BytesStart::new("c");
    start.push_attribute(("r", reference.as_str()));
    if let Some(style) = style {
        start.push_attribute(("s", style));
    }

    let v = |text: String| {
        vec![
            Event::Start(BytesStart::new("v")),
            Event::Text(BytesText::new(&text).into_owned()),
            Event::End(BytesEnd::new("v")),
        ]
    };
    let body = match value {
        CellValue::Empty => None,
        CellValue::Text(text) => {
            start.push_attribute(("t", "inlineStr"));
            let mut t = BytesStart::new("t");
            t.push_attribute(("xml:space", "preserve"));
            Some(vec![
                Event::Start(BytesStart::new("is")),
                Event::Start(t),
                Event::Text(BytesText::new(text).into_owned()),
                Event::End(BytesEnd::new("t")),
                Event::End(BytesEnd::new("is")),
            ])
        }
        CellValue::Number(n) => Some(v(n.to_string())),
        CellValue::Int(i) => Some(v(i.to_string())),
        CellValue::Bool(b) => {
            start.push_attribute(("t", "b"));
            Some(v(if *b { "1" } else { "0" }.to_string()))
        }
    };
    Ok(XmlCell { col, start, body })
}

/// 复制元素属性,替换/删除指定属性
fn rewrite_attrs(
    element: &BytesStart,
    replace: &[(&str, &str)],
    remove: &[&str],
) -> RepositoryResult<BytesStart<'static>> {
    let name = String::from_utf8_lossy(element.name().as_ref()).into_owned();
    let mut out = BytesStart::new(name);
    let mut pending: Vec<&(&str, &str)> = replace.iter().collect();
    for attr in element.attributes() {
        let attr = attr.map_err(xml_error)?;
        let key = attr.key.as_ref();
        if remove.iter().any(|k| k.as_bytes() == key) {
            continue;
        }
        // 替换值留在原属性位置
        match pending.iter().position(|(k, _)| k.as_bytes() == key) {
            Some(idx) => {
                let (k, v) = pending.remove(idx);
                out.push_attribute((*k, *v));
            }
            None => out.push_attribute(attr),
        }
    }
    for (key, value) in pending {
        out.push_attribute((*key, *value));
    }
    Ok(out)
}
