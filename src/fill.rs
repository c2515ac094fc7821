// Fills a fillable PDF template from form values and the captured signature.
//
// Every field write is best effort: a field the template does not have is
// logged and recorded in the `FillReport`, and the document is produced
// anyway. The same goes for the signature: an absent or blank image is
// skipped, and an embed failure is logged without failing the fill. A template
// with no form at all gets an empty one.

use std::collections::BTreeMap;

use log::{debug, info, warn};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream, StringFormat, dictionary};
use serde::Deserialize;

use crate::blank::BlankDetector;
use crate::codec::{self, SignatureImage};
use crate::error::{Error, Result};
use crate::types::Rgba;

/// Field trees deeper than this are treated as malformed.
const MAX_FIELD_DEPTH: usize = 32;
pub const MAX_POLICIES: usize = 4;
const CARD_DIGITS: usize = 16;

/// Where the signature goes, in PDF points from the bottom-left of the page.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct SignaturePlacement {
    /// Zero-based; clamped to the last page.
    pub page_index: usize,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Default for SignaturePlacement {
    fn default() -> Self {
        Self { page_index: 2, x: 360.0, y: 90.0, width: 160.0, height: 50.0 }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SignatureOutcome {
    Embedded,
    Absent,
    Blank,
    Failed(String),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FillReport {
    pub missing_fields: Vec<String>,
    pub signature: SignatureOutcome,
}

/// Anything named fields can be written into.
pub trait FieldWriter {
    fn set_text(&mut self, name: &str, value: &str);
    fn set_checked(&mut self, name: &str, checked: bool);
}

pub struct FormFiller {
    doc: Document,
    fields: BTreeMap<String, ObjectId>,
    missing: Vec<String>,
    signature: SignatureOutcome,
}

impl FormFiller {
    pub fn from_bytes(template: &[u8]) -> Result<Self> {
        let mut doc = Document::load_mem(template)?;
        ensure_acroform(&mut doc)?;
        let fields = index_fields(&doc)?;
        set_need_appearances(&mut doc)?;
        debug!("template has {} named fields", fields.len());
        Ok(Self { doc, fields, missing: Vec::new(), signature: SignatureOutcome::Absent })
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    fn lookup(&mut self, name: &str, kind: &str) -> Option<ObjectId> {
        match self.fields.get(name) {
            Some(&id) => Some(id),
            None => {
                warn!("missing {kind} field: {name}");
                if !self.missing.iter().any(|m| m == name) {
                    self.missing.push(name.to_owned());
                }
                None
            }
        }
    }

    /// Draw `image` at `placement` unless it is absent or looks blank.
    pub fn embed_signature(
        &mut self,
        image: Option<&SignatureImage>,
        placement: &SignaturePlacement,
        detector: &BlankDetector,
    ) -> &SignatureOutcome {
        self.signature = match image {
            None => SignatureOutcome::Absent,
            Some(image) if detector.is_blank_image(image) => {
                info!("signature looks blank, not embedding");
                SignatureOutcome::Blank
            }
            Some(image) => match embed_image(&mut self.doc, image, placement) {
                Ok(()) => SignatureOutcome::Embedded,
                Err(e) => {
                    warn!("signature embed failed: {e}");
                    SignatureOutcome::Failed(e.to_string())
                }
            },
        };
        &self.signature
    }

    /// Serialize the filled document.
    pub fn finish(mut self) -> Result<(Vec<u8>, FillReport)> {
        let mut out = Vec::new();
        self.doc.save_to(&mut out)?;
        let report = FillReport { missing_fields: self.missing, signature: self.signature };
        Ok((out, report))
    }
}

impl FieldWriter for FormFiller {
    fn set_text(&mut self, name: &str, value: &str) {
        let Some(id) = self.lookup(name, "text") else { return };
        match self.doc.get_object_mut(id).and_then(Object::as_dict_mut) {
            Ok(dict) => dict.set("V", text_object(value)),
            Err(e) => warn!("text field {name} is not a dictionary: {e}"),
        }
    }

    fn set_checked(&mut self, name: &str, checked: bool) {
        let Some(id) = self.lookup(name, "checkbox") else { return };
        let widgets = widget_ids(&self.doc, id);
        let state = if checked {
            widgets
                .first()
                .and_then(|&w| on_state(&self.doc, w))
                .unwrap_or_else(|| b"Yes".to_vec())
        } else {
            b"Off".to_vec()
        };

        if let Ok(dict) = self.doc.get_object_mut(id).and_then(Object::as_dict_mut) {
            dict.set("V", Object::Name(state.clone()));
        }
        for w in widgets {
            if let Ok(dict) = self.doc.get_object_mut(w).and_then(Object::as_dict_mut) {
                dict.set("AS", Object::Name(state.clone()));
            }
        }
    }
}

/// PDF text string: literal when it fits PDFDocEncoding's ASCII range, UTF-16BE otherwise.
fn text_object(value: &str) -> Object {
    if value.is_ascii() {
        return Object::string_literal(value);
    }
    let mut bytes = vec![0xFE, 0xFF];
    for unit in value.encode_utf16() {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    Object::String(bytes, StringFormat::Hexadecimal)
}

fn decode_text(bytes: &[u8]) -> String {
    if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = rest.chunks_exact(2).map(|c| u16::from_be_bytes([c[0], c[1]])).collect();
        return String::from_utf16_lossy(&units);
    }
    bytes.iter().map(|&b| b as char).collect()
}

fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> Result<&'a Object> {
    match obj {
        Object::Reference(id) => Ok(doc.get_object(*id)?),
        other => Ok(other),
    }
}

fn catalog_id(doc: &Document) -> Result<ObjectId> {
    Ok(doc.trailer.get(b"Root")?.as_reference()?)
}

fn acroform<'a>(doc: &'a Document) -> Result<&'a Dictionary> {
    let catalog = doc.get_object(catalog_id(doc)?)?.as_dict()?;
    let form = catalog
        .get(b"AcroForm")
        .map_err(|_| Error::NoForm("catalog has no AcroForm".into()))?;
    Ok(resolve(doc, form)?.as_dict()?)
}

/// Map every named field to its object, keyed by fully qualified name.
fn index_fields(doc: &Document) -> Result<BTreeMap<String, ObjectId>> {
    let form = acroform(doc)?;
    let fields = match form.get(b"Fields") {
        Ok(obj) => resolve(doc, obj)?.as_array()?.clone(),
        Err(_) => Vec::new(),
    };

    let mut out = BTreeMap::new();
    for field in &fields {
        if let Object::Reference(id) = field {
            walk_field(doc, *id, "", 0, &mut out);
        }
    }
    Ok(out)
}

fn walk_field(doc: &Document, id: ObjectId, prefix: &str, depth: usize, out: &mut BTreeMap<String, ObjectId>) {
    if depth > MAX_FIELD_DEPTH {
        warn!("field tree too deep at {id:?}, stopping");
        return;
    }
    let Ok(dict) = doc.get_object(id).and_then(Object::as_dict) else { return };

    let name = match dict.get(b"T") {
        Ok(Object::String(bytes, _)) => {
            let partial = decode_text(bytes);
            let full = if prefix.is_empty() { partial } else { format!("{prefix}.{partial}") };
            out.insert(full.clone(), id);
            full
        }
        _ => prefix.to_owned(),
    };

    if let Ok(Object::Array(kids)) = dict.get(b"Kids") {
        for kid in kids {
            if let Object::Reference(kid_id) = kid {
                walk_field(doc, *kid_id, &name, depth + 1, out);
            }
        }
    }
}

/// Widget annotations of a field: its unnamed kids, or the field itself when merged.
fn widget_ids(doc: &Document, field: ObjectId) -> Vec<ObjectId> {
    let Ok(dict) = doc.get_object(field).and_then(Object::as_dict) else { return Vec::new() };
    let kids: Vec<ObjectId> = match dict.get(b"Kids") {
        Ok(Object::Array(kids)) => kids
            .iter()
            .filter_map(|k| k.as_reference().ok())
            .filter(|&k| {
                doc.get_object(k)
                    .and_then(Object::as_dict)
                    .map(|d| !d.has(b"T"))
                    .unwrap_or(false)
            })
            .collect(),
        _ => Vec::new(),
    };
    if kids.is_empty() { vec![field] } else { kids }
}

/// The checkbox's "on" appearance name, from `AP/N`.
fn on_state(doc: &Document, widget: ObjectId) -> Option<Vec<u8>> {
    let dict = doc.get_object(widget).and_then(Object::as_dict).ok()?;
    let ap = resolve(doc, dict.get(b"AP").ok()?).ok()?.as_dict().ok()?;
    let normal = resolve(doc, ap.get(b"N").ok()?).ok()?.as_dict().ok()?;
    normal
        .iter()
        .map(|(k, _)| k.clone())
        .find(|k| k.as_slice() != b"Off")
}

/// Give a template without a form an empty one, so every write is simply
/// reported missing and the signature can still be drawn.
fn ensure_acroform(doc: &mut Document) -> Result<()> {
    let root = catalog_id(doc)?;
    if doc.get_object(root)?.as_dict()?.has(b"AcroForm") {
        return Ok(());
    }
    warn!("template has no AcroForm, adding an empty one");
    let form_id = doc.add_object(dictionary! { "Fields" => Vec::<Object>::new() });
    doc.get_object_mut(root)?.as_dict_mut()?.set("AcroForm", form_id);
    Ok(())
}

fn set_need_appearances(doc: &mut Document) -> Result<()> {
    let root = catalog_id(doc)?;
    let form_ref = match doc.get_object(root)?.as_dict()?.get(b"AcroForm") {
        Ok(Object::Reference(id)) => Some(*id),
        Ok(_) => None,
        Err(_) => return Err(Error::NoForm("catalog has no AcroForm".into())),
    };
    let form = match form_ref {
        Some(id) => doc.get_object_mut(id)?.as_dict_mut()?,
        None => doc.get_object_mut(root)?.as_dict_mut()?.get_mut(b"AcroForm")?.as_dict_mut()?,
    };
    form.set("NeedAppearances", true);
    Ok(())
}

/// Resources for `page`, following `Parent` when the page inherits them.
fn inherited_resources(doc: &Document, page: ObjectId) -> Option<Dictionary> {
    let mut current = Some(page);
    let mut depth = 0;
    while let Some(id) = current {
        let dict = doc.get_object(id).and_then(Object::as_dict).ok()?;
        if let Ok(res) = dict.get(b"Resources") {
            return resolve(doc, res).ok()?.as_dict().ok().cloned();
        }
        current = dict.get(b"Parent").and_then(Object::as_reference).ok();
        depth += 1;
        if depth > MAX_FIELD_DEPTH {
            return None;
        }
    }
    None
}

fn page_dict_mut(doc: &mut Document, page: ObjectId) -> Result<&mut Dictionary> {
    Ok(doc.get_object_mut(page)?.as_dict_mut()?)
}

fn embed_image(doc: &mut Document, image: &SignatureImage, placement: &SignaturePlacement) -> Result<()> {
    let pages = doc.get_pages();
    if pages.is_empty() {
        return Err(Error::NoForm("template has no pages".into()));
    }
    let index = placement.page_index.min(pages.len() - 1);
    let page_id = *pages
        .values()
        .nth(index)
        .ok_or_else(|| Error::NoForm(format!("page {index} missing")))?;

    let raster = codec::decode(image)?;
    let mut rgb = Vec::with_capacity(raster.pixels.len() * 3);
    let mut alpha = Vec::with_capacity(raster.pixels.len());
    for &px in &raster.pixels {
        let c = Rgba::unpack(px);
        rgb.extend_from_slice(&[c.r, c.g, c.b]);
        alpha.push(c.a);
    }

    let smask_id = doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => raster.width as i64,
            "Height" => raster.height as i64,
            "ColorSpace" => "DeviceGray",
            "BitsPerComponent" => 8,
        },
        alpha,
    ));
    let image_id = doc.add_object(Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => raster.width as i64,
            "Height" => raster.height as i64,
            "ColorSpace" => "DeviceRGB",
            "BitsPerComponent" => 8,
            "SMask" => smask_id,
        },
        rgb,
    ));

    // Give the page its own resource dictionary (copied from the inherited one
    // if needed) so the new XObject does not leak onto other pages.
    let mut resources = match doc.get_object(page_id)?.as_dict()?.get(b"Resources") {
        Ok(Object::Reference(id)) => doc.get_object(*id)?.as_dict()?.clone(),
        Ok(Object::Dictionary(dict)) => dict.clone(),
        _ => inherited_resources(doc, page_id).unwrap_or_else(Dictionary::new),
    };
    let mut xobjects = match resources.get(b"XObject") {
        Ok(obj) => resolve(doc, obj)?.as_dict()?.clone(),
        Err(_) => Dictionary::new(),
    };
    let mut n = 0;
    let name = loop {
        let candidate = format!("SigPad{n}");
        if !xobjects.has(candidate.as_bytes()) {
            break candidate;
        }
        n += 1;
    };
    xobjects.set(name.as_str(), image_id);
    resources.set("XObject", xobjects);

    // Isolate the existing content in q/Q so its graphics state cannot move us.
    let draw = format!(
        "Q q {} 0 0 {} {} {} cm /{} Do Q",
        placement.width, placement.height, placement.x, placement.y, name
    );
    let open_id = doc.add_object(Stream::new(Dictionary::new(), b"q".to_vec()));
    let draw_id = doc.add_object(Stream::new(Dictionary::new(), draw.into_bytes()));

    let page = page_dict_mut(doc, page_id)?;
    let mut contents = vec![Object::Reference(open_id)];
    match page.get(b"Contents") {
        Ok(Object::Array(existing)) => contents.extend(existing.iter().cloned()),
        Ok(other) => contents.push(other.clone()),
        Err(_) => {}
    }
    contents.push(Object::Reference(draw_id));
    page.set("Contents", contents);
    page.set("Resources", resources);

    info!("signature embedded on page {} ({}x{} px)", index + 1, raster.width, raster.height);
    Ok(())
}

// ---------------------------- form values ----------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relationship {
    Ownself,
    Spouse,
    Children,
    Parent,
    Grandparent,
    Sibling,
    Company,
}

impl Relationship {
    pub const ALL: [Relationship; 7] = [
        Relationship::Ownself,
        Relationship::Spouse,
        Relationship::Children,
        Relationship::Parent,
        Relationship::Grandparent,
        Relationship::Sibling,
        Relationship::Company,
    ];

    /// Suffix used by the template's checkbox names (its casing is not uniform).
    pub fn field_suffix(self) -> &'static str {
        match self {
            Relationship::Ownself => "Ownself",
            Relationship::Spouse => "spouse",
            Relationship::Children => "children",
            Relationship::Parent => "Parent",
            Relationship::Grandparent => "Grandparent",
            Relationship::Sibling => "Sibling",
            Relationship::Company => "Company",
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct PolicyEntry {
    pub policy_no: String,
    pub insured: String,
    pub relationship: Option<Relationship>,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Signer {
    pub owner_name: String,
    pub owner_nric: String,
    pub date: String,
    pub month: String,
    pub year: String,
    pub state: String,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct FundSources {
    #[serde(rename = "self")]
    pub own: bool,
    pub parent: bool,
    pub spouse: bool,
    pub others: bool,
    pub others_detail: String,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct WealthSources {
    pub employment_business: bool,
    pub investment: bool,
    pub inheritance: bool,
    pub savings: bool,
    pub parents: bool,
    pub spouse: bool,
    pub others: bool,
    pub others_detail: String,
}

#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ThirdPartyPayer {
    pub payer: bool,
    pub name: String,
    pub email: String,
    pub source_of_funds: FundSources,
    pub source_of_wealth: WealthSources,
}

/// Everything the enrolment form collects besides the signature.
/// Values are written through as typed; nothing is validated.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct EnrolmentForm {
    pub cc_agree: bool,
    pub charge_all_outstanding: bool,
    pub one_time_charge: bool,
    pub one_time_amount: String,
    pub policies: Vec<PolicyEntry>,
    pub credit_card: bool,
    pub debit_card: bool,
    pub visa: bool,
    pub mastercard: bool,
    pub card_number: String,
    pub expiry_month: String,
    pub expiry_year: String,
    pub card_bank: String,
    pub card_name: String,
    pub signer: Signer,
    pub third_party: ThirdPartyPayer,
}

/// First two characters of `value`, right-aligned; padding becomes empty.
fn split_two(value: &str) -> [String; 2] {
    let chars: Vec<char> = value.chars().take(2).collect();
    match chars.as_slice() {
        [] => [String::new(), String::new()],
        [only] => [String::new(), only.to_string()],
        [a, b, ..] => [a.to_string(), b.to_string()],
    }
}

impl EnrolmentForm {
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    /// Write every value into its template field.
    pub fn apply(&self, out: &mut impl FieldWriter) {
        out.set_checked("CCAgree", self.cc_agree);
        out.set_checked("Onetimecharge_alloutstanding", self.charge_all_outstanding);
        out.set_checked("Onetimecharge_tick", self.one_time_charge);
        // the amount box is disabled (and emptied) unless the tick is set
        let amount = if self.one_time_charge { self.one_time_amount.as_str() } else { "" };
        out.set_text("Onetimecharge_amt", amount);

        if self.policies.len() > MAX_POLICIES {
            warn!("{} policy rows given, only {MAX_POLICIES} fit the form", self.policies.len());
        }
        for (i, policy) in self.policies.iter().take(MAX_POLICIES).enumerate() {
            let n = i + 1;
            out.set_text(&format!("PolicyNo{n}"), &policy.policy_no);
            out.set_text(&format!("Insured{n}"), &policy.insured);
            for rel in Relationship::ALL {
                out.set_checked(&format!("Relationship{n}_{}", rel.field_suffix()), false);
            }
            if let Some(rel) = policy.relationship {
                out.set_checked(&format!("Relationship{n}_{}", rel.field_suffix()), true);
            }
        }

        out.set_checked("CC_Tick", self.credit_card);
        out.set_checked("DebitC_Tick", self.debit_card);

        let digits: Vec<char> = self.card_number.chars().filter(|c| !c.is_whitespace()).collect();
        for i in 0..CARD_DIGITS {
            let ch = digits.get(i).map(char::to_string).unwrap_or_default();
            out.set_text(&format!("CardNo_{}", i + 1), &ch);
        }

        out.set_checked("Visa_Tick", self.visa);
        out.set_checked("Master_Tick", self.mastercard);

        let [m1, m2] = split_two(self.expiry_month.trim());
        let [y1, y2] = split_two(self.expiry_year.trim());
        out.set_text("CardExpry_M1", &m1);
        out.set_text("CardExpry_M2", &m2);
        out.set_text("CardExpry_Y1", &y1);
        out.set_text("CardExpry_Y2", &y2);

        out.set_text("CardBank", &self.card_bank);
        out.set_text("CardName", &self.card_name);

        let s = &self.signer;
        out.set_text("Sign_OwnerName", &s.owner_name);
        out.set_text("Sign_OwnerNIRC", &s.owner_nric);
        out.set_text("Sign_Date", &s.date);
        out.set_text("Sign_Month", &s.month);
        out.set_text("Sign_Year", &s.year);
        out.set_text("Sign_State", &s.state);

        let t = &self.third_party;
        out.set_checked("ThirdPP_Yes", t.payer);
        out.set_text("ThirdPP_Name", &t.name);
        out.set_text("ThirdPP_Email", &t.email);

        let f = &t.source_of_funds;
        out.set_checked("ThirdPP_SourceFund_Self", f.own);
        out.set_checked("ThirdPP_SourceFund_Parent", f.parent);
        out.set_checked("ThirdPP_SourceFund_Spouse", f.spouse);
        out.set_checked("ThirdPP_SourceFund_Others", f.others);
        out.set_text("ThirdPP_SourceFund_Others_Write", &f.others_detail);

        let w = &t.source_of_wealth;
        out.set_checked("ThirdPP_SourceWealth_EmployBus", w.employment_business);
        out.set_checked("ThirdPP_SourceWealth_Invest", w.investment);
        out.set_checked("ThirdPP_SourceWealth_Inherit", w.inheritance);
        out.set_checked("ThirdPP_SourceWealth_Savings", w.savings);
        out.set_checked("ThirdPP_SourceWealth_Parents", w.parents);
        out.set_checked("ThirdPP_SourceWealth_Spouse", w.spouse);
        out.set_checked("ThirdPP_SourceWealth_Others", w.others);
        out.set_text("ThirdPP_SourceWealth_Others_Write", &w.others_detail);
    }
}

/// Load `template`, write `form` and `signature` into it, return the new PDF.
pub fn fill_document(
    template: &[u8],
    form: &EnrolmentForm,
    signature: Option<&SignatureImage>,
    placement: &SignaturePlacement,
    detector: &BlankDetector,
) -> Result<(Vec<u8>, FillReport)> {
    let mut filler = FormFiller::from_bytes(template)?;
    form.apply(&mut filler);
    filler.embed_signature(signature, placement, detector);
    let (bytes, report) = filler.finish()?;
    if !report.missing_fields.is_empty() {
        info!("{} fields were not found in the template", report.missing_fields.len());
    }
    Ok((bytes, report))
}
