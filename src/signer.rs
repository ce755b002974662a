//! Signing orchestrator
//!
//! Ties the pieces together: parse the document, append an incremental
//! update carrying the signature field and a placeholder signature
//! dictionary, compute the ByteRange digest over the final bytes, build the
//! CMS structure, and splice it into the reserved /Contents window. The
//! update is append-only, so prior signatures stay intact and a document
//! can be signed any number of times.

use crate::cms::CmsSignedDataBuilder;
use crate::crl::CrlFetcher;
use crate::dss::DssBuilder;
use crate::error::{Error, Result};
use crate::object::{IndirectObject, ObjectRef, PdfDict, PdfValue};
use crate::ocsp::OcspClient;
use crate::provider::{HashAlgorithm, SigningProvider};
use crate::structure::{find, rfind, StructuralSnapshot};
use crate::timestamp::{TimestampClient, TsaConfig};
use crate::update::{IncrementalUpdateWriter, ObjectNumberAllocator};
use crate::x509::SignerCertificate;
use std::path::Path;
use time::OffsetDateTime;
use tracing::{debug, info};

const BYTERANGE_PLACEHOLDER: &str = "[0 ********** ********** **********]";

/// Where and how the signature appears on the page
#[derive(Debug, Clone)]
pub struct SignatureAppearance {
    /// 1-based page number
    pub page: u32,
    pub rect: [f64; 4],
    /// Text drawn in the widget; empty rects render nothing
    pub label: Option<String>,
}

impl Default for SignatureAppearance {
    fn default() -> Self {
        // Invisible signature on page 1
        Self {
            page: 1,
            rect: [0.0; 4],
            label: None,
        }
    }
}

impl SignatureAppearance {
    pub fn invisible() -> Self {
        Self::default()
    }

    pub fn visible(page: u32, rect: [f64; 4]) -> Self {
        Self {
            page,
            rect,
            label: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    fn is_visible(&self) -> bool {
        self.rect[2] - self.rect[0] > 0.0 && self.rect[3] - self.rect[1] > 0.0
    }
}

/// Everything that varies between signatures on the same key
#[derive(Debug, Clone)]
pub struct SignatureRequest {
    field_name: Option<String>,
    signer_name: Option<String>,
    reason: Option<String>,
    location: Option<String>,
    contact_info: Option<String>,
    hash: HashAlgorithm,
    certification_level: u8,
    appearance: SignatureAppearance,
    timestamp: Option<TsaConfig>,
    signing_time: Option<OffsetDateTime>,
}

impl Default for SignatureRequest {
    fn default() -> Self {
        Self::new()
    }
}

impl SignatureRequest {
    pub fn new() -> Self {
        Self {
            field_name: None,
            signer_name: None,
            reason: None,
            location: None,
            contact_info: None,
            hash: HashAlgorithm::Sha256,
            certification_level: 0,
            appearance: SignatureAppearance::default(),
            timestamp: None,
            signing_time: None,
        }
    }

    /// Sign an existing empty field, or create one with this name
    pub fn with_field_name(mut self, name: impl Into<String>) -> Self {
        self.field_name = Some(name.into());
        self
    }

    pub fn with_signer_name(mut self, name: impl Into<String>) -> Self {
        self.signer_name = Some(name.into());
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn with_location(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_contact_info(mut self, contact: impl Into<String>) -> Self {
        self.contact_info = Some(contact.into());
        self
    }

    pub fn with_hash(mut self, hash: HashAlgorithm) -> Self {
        self.hash = hash;
        self
    }

    /// DocMDP certification level: 0 = approval signature, 1 = no changes,
    /// 2 = form filling, 3 = form filling and annotations
    pub fn with_certification_level(mut self, level: u8) -> Self {
        self.certification_level = level;
        self
    }

    pub fn with_appearance(mut self, appearance: SignatureAppearance) -> Self {
        self.appearance = appearance;
        self
    }

    pub fn with_timestamp(mut self, tsa: TsaConfig) -> Self {
        self.timestamp = Some(tsa);
        self
    }

    /// Pin signingTime and /M instead of using the current time
    pub fn with_signing_time(mut self, time: OffsetDateTime) -> Self {
        self.signing_time = Some(time);
        self
    }
}

/// Signs documents with one provider; stateless between calls
pub struct PdfSigner<'a> {
    provider: &'a dyn SigningProvider,
}

impl<'a> PdfSigner<'a> {
    pub fn new(provider: &'a dyn SigningProvider) -> Self {
        Self { provider }
    }

    /// Sign `pdf` and return the new document bytes
    pub fn sign(&self, pdf: &[u8], request: &SignatureRequest) -> Result<Vec<u8>> {
        if request.certification_level > 3 {
            return Err(Error::Field(format!(
                "certification level {} out of range 0..=3",
                request.certification_level
            )));
        }
        let snapshot = StructuralSnapshot::parse(pdf)?;
        if request.certification_level > 0
            && snapshot.signature_fields.iter().any(|f| f.signed)
        {
            return Err(Error::Field(
                "certification signature must be the first signature".into(),
            ));
        }

        let plan = plan_field(&snapshot, request)?;
        // A pre-made field stays on the page it was annotated on
        let target_page = match &plan {
            FieldPlan::Existing { page, .. } => *page,
            FieldPlan::New { .. } => request.appearance.page,
        };
        let page = snapshot
            .pages
            .iter()
            .find(|p| p.number == target_page)
            .ok_or_else(|| Error::Field(format!("page {} not found", target_page)))?;

        let mut alloc = ObjectNumberAllocator::new(&snapshot);
        let sig_num = alloc.next();
        let widget_num = match &plan {
            FieldPlan::Existing { obj_num, .. } => *obj_num,
            FieldPlan::New { .. } => alloc.next(),
        };
        let appearance_num = if request.appearance.is_visible() {
            Some(alloc.next())
        } else {
            None
        };

        let signing_time = request.signing_time.unwrap_or_else(OffsetDateTime::now_utc);
        let placeholder = placeholder_len(self.provider, request.timestamp.is_some());
        debug!(placeholder, "reserving signature placeholder");

        let mut writer = IncrementalUpdateWriter::new();
        writer.add_object(signature_dict(
            sig_num,
            request,
            signing_time,
            placeholder,
        ));
        let (field_name, rect) = match &plan {
            FieldPlan::Existing { name, rect, .. } => (name.clone(), *rect),
            FieldPlan::New { name } => (name.clone(), request.appearance.rect),
        };
        writer.add_object(widget_dict(
            widget_num,
            &field_name,
            rect,
            sig_num,
            page.obj_num,
            appearance_num,
        ));
        if let Some(ap_num) = appearance_num {
            writer.add_object(appearance_xobject(ap_num, &request.appearance));
        }

        if matches!(&plan, FieldPlan::New { .. }) {
            let page_obj = snapshot
                .object_bytes(pdf, page.obj_num)
                .ok_or_else(|| Error::Field(format!("page object {} unresolvable", page.obj_num)))?;
            writer.add_object(add_annot_to_page(page.obj_num, page_obj, widget_num)?);
        }

        self.wire_acroform(pdf, &snapshot, &plan, widget_num, sig_num, request, &mut alloc, &mut writer)?;

        let mut updated = writer.append_to(pdf, &snapshot);

        // Locate the reserved windows in the final bytes and fill ByteRange
        let window = locate_placeholder(&updated, sig_num)?;
        splice_byte_range(&mut updated, &window);

        // Digest over everything except the /Contents window
        let digest = byte_range_digest(&updated, &window, request.hash);
        let cms = self.build_cms(request, signing_time, &digest)?;

        splice_contents(&mut updated, &window, &cms)?;
        info!(field = %field_name, bytes = updated.len(), "document signed");
        Ok(updated)
    }

    /// Fetch revocation material for every signed signature and append a
    /// /DSS dictionary, making the document LTV-capable.
    pub fn enable_ltv(&self, pdf: &[u8]) -> Result<Vec<u8>> {
        let snapshot = StructuralSnapshot::parse(pdf)?;
        let signed: Vec<_> = snapshot
            .signature_fields
            .iter()
            .filter(|f| f.signed)
            .collect();
        if signed.is_empty() {
            return Err(Error::Field("document carries no signed signatures".into()));
        }

        let ocsp_client = OcspClient::new();
        let crl_fetcher = CrlFetcher::new();
        let mut dss = DssBuilder::new();

        for field in &signed {
            let value_num = field
                .value_obj
                .ok_or_else(|| Error::Field(format!("field {} has no value object", field.name)))?;
            let value_obj = snapshot
                .object_bytes(pdf, value_num)
                .ok_or_else(|| Error::Field(format!("signature object {} unresolvable", value_num)))?;
            let contents = extract_contents(value_obj)?;
            let certs = embedded_certificates(&contents)?;
            if certs.is_empty() {
                continue;
            }

            // Every certificate in the chain gets its own evidence, paired
            // with whichever chain member issued it
            let mut ocsps = Vec::new();
            let mut crls = Vec::new();
            for der in &certs {
                let subject = SignerCertificate::new(der);
                let issuer_der = find_issuer(&certs, &subject).unwrap_or(der);
                let issuer = SignerCertificate::new(issuer_der);
                if let Some(resp) = ocsp_client.fetch(&subject, &issuer) {
                    ocsps.push(resp);
                }
                crls.extend(crl_fetcher.fetch(&subject));
            }
            dss.add_signature_validation(&contents, &certs, &ocsps, &crls);
        }

        if dss.is_empty() {
            return Err(Error::Field(
                "no validation material could be gathered".into(),
            ));
        }

        let mut alloc = ObjectNumberAllocator::new(&snapshot);
        let (objects, dss_num) = dss.build_objects(&mut alloc);
        let mut writer = IncrementalUpdateWriter::new();
        for obj in objects {
            writer.add_object(obj);
        }

        // Catalog gains (or replaces) its /DSS entry
        let catalog_num = snapshot.trailer.root.num;
        let catalog = snapshot
            .object_bytes(pdf, catalog_num)
            .ok_or(crate::error::StructureError::MissingRoot)?;
        let patched = set_ref_entry(dict_body(catalog)?, "DSS", dss_num);
        writer.add_object(IndirectObject {
            num: catalog_num,
            body: patched,
        });

        info!(signatures = signed.len(), "document security store appended");
        Ok(writer.append_to(pdf, &snapshot))
    }

    /// Read, sign, and write in one step
    pub fn sign_file(
        &self,
        input: impl AsRef<Path>,
        output: impl AsRef<Path>,
        request: &SignatureRequest,
    ) -> Result<()> {
        let pdf = std::fs::read(input)?;
        let signed = self.sign(&pdf, request)?;
        std::fs::write(output, signed)?;
        Ok(())
    }

    fn build_cms(
        &self,
        request: &SignatureRequest,
        signing_time: OffsetDateTime,
        digest: &[u8],
    ) -> Result<Vec<u8>> {
        let tsa_client = request.timestamp.clone().map(TimestampClient::new);
        let mut builder = CmsSignedDataBuilder::new(self.provider, request.hash)
            .with_signing_time(signing_time);
        if let Some(client) = &tsa_client {
            builder = builder.with_timestamp(client);
        }
        builder.build(digest)
    }

    #[allow(clippy::too_many_arguments)]
    fn wire_acroform(
        &self,
        pdf: &[u8],
        snapshot: &StructuralSnapshot,
        plan: &FieldPlan,
        widget_num: u32,
        sig_num: u32,
        request: &SignatureRequest,
        alloc: &mut ObjectNumberAllocator,
        writer: &mut IncrementalUpdateWriter,
    ) -> Result<()> {
        let needs_perms = request.certification_level > 0;
        let is_new_field = matches!(plan, FieldPlan::New { .. });
        if !is_new_field && !needs_perms {
            // Field already wired into /Fields and /Annots
            return Ok(());
        }

        let catalog_num = snapshot.trailer.root.num;
        let catalog = snapshot
            .object_bytes(pdf, catalog_num)
            .ok_or(crate::error::StructureError::MissingRoot)?;
        let mut catalog_dict = dict_body(catalog)?.to_vec();

        if is_new_field {
            match find_acroform(&catalog_dict) {
                AcroForm::Reference(num) => {
                    let form_obj = snapshot
                        .object_bytes(pdf, num)
                        .ok_or_else(|| Error::Field(format!("AcroForm object {} unresolvable", num)))?;
                    let mut form = dict_body(form_obj)?.to_vec();
                    form = push_array_entry(&form, "Fields", widget_num)?;
                    form = ensure_sig_flags(&form);
                    writer.add_object(IndirectObject { num, body: form });
                }
                AcroForm::Inline(range) => {
                    let inline = catalog_dict[range.clone()].to_vec();
                    let mut patched = push_array_entry(&inline, "Fields", widget_num)?;
                    patched = ensure_sig_flags(&patched);
                    catalog_dict.splice(range, patched);
                }
                AcroForm::Absent => {
                    let form_num = alloc.next();
                    let mut form = PdfDict::new();
                    form.set(
                        "Fields",
                        PdfValue::Array(vec![PdfValue::reference(widget_num)]),
                    );
                    form.set("SigFlags", PdfValue::Integer(3));
                    writer.add_object(IndirectObject::from_dict(form_num, &form));
                    catalog_dict = append_dict_entry(
                        &catalog_dict,
                        &format!("/AcroForm {} 0 R", form_num),
                    );
                }
            }
        }

        if needs_perms {
            catalog_dict = append_dict_entry(
                &catalog_dict,
                &format!("/Perms << /DocMDP {} 0 R >>", sig_num),
            );
        }

        // Only rewrite the catalog when something in it changed
        if catalog_dict != dict_body(catalog)? {
            writer.add_object(IndirectObject {
                num: catalog_num,
                body: catalog_dict,
            });
        }
        Ok(())
    }
}

// ============================================================================
// Field planning
// ============================================================================

enum FieldPlan {
    /// Sign an existing empty field in place
    Existing {
        obj_num: u32,
        name: String,
        rect: [f64; 4],
        /// 1-based page the widget is annotated on
        page: u32,
    },
    /// Create a fresh field
    New { name: String },
}

fn plan_field(snapshot: &StructuralSnapshot, request: &SignatureRequest) -> Result<FieldPlan> {
    if let Some(name) = &request.field_name {
        if let Some(field) = snapshot.signature_fields.iter().find(|f| &f.name == name) {
            if field.signed {
                return Err(Error::Field(format!("field '{}' is already signed", name)));
            }
            return Ok(FieldPlan::Existing {
                obj_num: field.obj_num,
                name: field.name.clone(),
                rect: field.rect,
                page: field.page,
            });
        }
        return Ok(FieldPlan::New { name: name.clone() });
    }
    // Synthesize a name that collides with nothing
    let mut n = snapshot.signature_fields.len() as u32 + 1;
    loop {
        let candidate = format!("Signature{}", n);
        if !snapshot
            .signature_fields
            .iter()
            .any(|f| f.name == candidate)
        {
            return Ok(FieldPlan::New { name: candidate });
        }
        n += 1;
    }
}

// ============================================================================
// Object construction
// ============================================================================

/// Signature dictionary with fixed-width /Contents and /ByteRange
/// placeholders. Width is frozen here; serialization must not change it.
fn signature_dict(
    num: u32,
    request: &SignatureRequest,
    signing_time: OffsetDateTime,
    placeholder: usize,
) -> IndirectObject {
    let mut dict = PdfDict::new();
    dict.set("Type", PdfValue::name("Sig"));
    dict.set("Filter", PdfValue::name("Adobe.PPKLite"));
    dict.set("SubFilter", PdfValue::name("adbe.pkcs7.detached"));
    if let Some(name) = &request.signer_name {
        dict.set("Name", PdfValue::string(name));
    }
    if let Some(reason) = &request.reason {
        dict.set("Reason", PdfValue::string(reason));
    }
    if let Some(location) = &request.location {
        dict.set("Location", PdfValue::string(location));
    }
    if let Some(contact) = &request.contact_info {
        dict.set("ContactInfo", PdfValue::string(contact));
    }
    dict.set("M", PdfValue::string(&format_pdf_date(signing_time)));
    if request.certification_level > 0 {
        let mut params = PdfDict::new();
        params.set("Type", PdfValue::name("TransformParams"));
        params.set("P", PdfValue::Integer(request.certification_level as i64));
        params.set("V", PdfValue::name("1.2"));
        let mut sig_ref = PdfDict::new();
        sig_ref.set("Type", PdfValue::name("SigRef"));
        sig_ref.set("TransformMethod", PdfValue::name("DocMDP"));
        sig_ref.set("TransformParams", PdfValue::Dict(params));
        dict.set("Reference", PdfValue::Array(vec![PdfValue::Dict(sig_ref)]));
    }
    dict.set("ByteRange", PdfValue::Raw(BYTERANGE_PLACEHOLDER.into()));
    dict.set("Contents", PdfValue::Raw(format!("<{}>", "0".repeat(placeholder * 2))));
    IndirectObject::from_dict(num, &dict)
}

fn widget_dict(
    num: u32,
    field_name: &str,
    rect: [f64; 4],
    sig_num: u32,
    page_num: u32,
    appearance_num: Option<u32>,
) -> IndirectObject {
    let mut dict = PdfDict::new();
    dict.set("Type", PdfValue::name("Annot"));
    dict.set("Subtype", PdfValue::name("Widget"));
    dict.set("FT", PdfValue::name("Sig"));
    dict.set("T", PdfValue::string(field_name));
    dict.set(
        "Rect",
        PdfValue::Array(rect.iter().map(|&v| PdfValue::Real(v)).collect()),
    );
    dict.set("V", PdfValue::reference(sig_num));
    dict.set("P", PdfValue::Reference(ObjectRef::new(page_num)));
    // Print flag; an invisible rect stays invisible regardless
    dict.set("F", PdfValue::Integer(4));
    if let Some(ap) = appearance_num {
        let mut ap_dict = PdfDict::new();
        ap_dict.set("N", PdfValue::reference(ap));
        dict.set("AP", PdfValue::Dict(ap_dict));
    }
    IndirectObject::from_dict(num, &dict)
}

/// Form XObject drawn as the widget's normal appearance
fn appearance_xobject(num: u32, appearance: &SignatureAppearance) -> IndirectObject {
    let width = appearance.rect[2] - appearance.rect[0];
    let height = appearance.rect[3] - appearance.rect[1];
    let mut dict = PdfDict::new();
    dict.set("Type", PdfValue::name("XObject"));
    dict.set("Subtype", PdfValue::name("Form"));
    dict.set(
        "BBox",
        PdfValue::Array(vec![
            PdfValue::Real(0.0),
            PdfValue::Real(0.0),
            PdfValue::Real(width),
            PdfValue::Real(height),
        ]),
    );
    let content = match &appearance.label {
        Some(label) => {
            let mut helv = PdfDict::new();
            helv.set("Type", PdfValue::name("Font"));
            helv.set("Subtype", PdfValue::name("Type1"));
            helv.set("BaseFont", PdfValue::name("Helvetica"));
            let mut fonts = PdfDict::new();
            fonts.set("Helv", PdfValue::Dict(helv));
            let mut resources = PdfDict::new();
            resources.set("Font", PdfValue::Dict(fonts));
            dict.set("Resources", PdfValue::Dict(resources));
            format!(
                "BT /Helv 9 Tf 2 {} Td ({}) Tj ET",
                (height - 11.0).max(2.0),
                crate::object::escape_pdf_string(label)
            )
        }
        None => String::new(),
    };
    IndirectObject::stream(num, dict, content.as_bytes())
}

/// Rewritten page object with the widget added to /Annots
fn add_annot_to_page(page_num: u32, page_obj: &[u8], widget_num: u32) -> Result<IndirectObject> {
    let dict = dict_body(page_obj)?;
    let body = if find(dict, b"/Annots").is_some() {
        push_array_entry(dict, "Annots", widget_num)?
    } else {
        append_dict_entry(dict, &format!("/Annots [{} 0 R]", widget_num))
    };
    Ok(IndirectObject {
        num: page_num,
        body,
    })
}

// ============================================================================
// Textual dictionary patching
//
// Existing objects are carried into the update with minimal edits so keys
// this crate does not model survive untouched.
// ============================================================================

/// Dictionary bytes of an object slice (`<<` through the matching `>>`)
fn dict_body(obj: &[u8]) -> Result<&[u8]> {
    let start = find(obj, b"<<")
        .ok_or_else(|| Error::Field("object carries no dictionary".into()))?;
    let mut depth = 0usize;
    let mut i = start;
    while i + 1 < obj.len() {
        if obj[i] == b'<' && obj[i + 1] == b'<' {
            depth += 1;
            i += 2;
        } else if obj[i] == b'>' && obj[i + 1] == b'>' {
            depth -= 1;
            i += 2;
            if depth == 0 {
                return Ok(&obj[start..i]);
            }
        } else {
            i += 1;
        }
    }
    Err(Error::Field("unterminated dictionary".into()))
}

/// Insert an entry before the dictionary's closing `>>`
fn append_dict_entry(dict: &[u8], entry: &str) -> Vec<u8> {
    let mut out = dict[..dict.len() - 2].to_vec();
    if out.last() != Some(&b' ') {
        out.push(b' ');
    }
    out.extend_from_slice(entry.as_bytes());
    out.extend_from_slice(b" >>");
    out
}

/// Append `num 0 R` to the array value at `key`
fn push_array_entry(dict: &[u8], key: &str, num: u32) -> Result<Vec<u8>> {
    let key_pattern = format!("/{}", key);
    let pos = find(dict, key_pattern.as_bytes())
        .ok_or_else(|| Error::Field(format!("dictionary has no /{}", key)))?;
    // Only whitespace may sit between the key and a direct array; an
    // indirect array object cannot be patched in place
    let value_at = pos + key_pattern.len();
    let ws = dict[value_at..]
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(0);
    if dict.get(value_at + ws) != Some(&b'[') {
        return Err(Error::Field(format!("/{} is not a direct array", key)));
    }
    let open = value_at + ws;
    let close = open
        + find(&dict[open..], b"]")
            .ok_or_else(|| Error::Field(format!("/{} array unterminated", key)))?;
    let mut out = dict[..close].to_vec();
    if out.last() != Some(&b'[') {
        out.push(b' ');
    }
    out.extend_from_slice(format!("{} 0 R", num).as_bytes());
    out.extend_from_slice(&dict[close..]);
    Ok(out)
}

/// Make sure /SigFlags 3 is present
fn ensure_sig_flags(dict: &[u8]) -> Vec<u8> {
    if find(dict, b"/SigFlags").is_some() {
        return dict.to_vec();
    }
    append_dict_entry(dict, "/SigFlags 3")
}

/// Set `/Key n 0 R`, replacing an existing reference value in place
fn set_ref_entry(dict: &[u8], key: &str, num: u32) -> Vec<u8> {
    let key_pattern = format!("/{}", key);
    let replacement = format!("/{} {} 0 R", key, num);
    if let Some(pos) = find(dict, key_pattern.as_bytes()) {
        // Skip past the old "n g R" value
        let after_key = pos + key_pattern.len();
        if let Some(r_off) = find(&dict[after_key..], b"R") {
            let mut out = dict[..pos].to_vec();
            out.extend_from_slice(replacement.as_bytes());
            out.extend_from_slice(&dict[after_key + r_off + 1..]);
            return out;
        }
    }
    append_dict_entry(dict, &replacement)
}

/// How the catalog refers to its AcroForm, if at all
enum AcroForm {
    Reference(u32),
    /// Byte range of the inline `<< ... >>` within the catalog dictionary
    Inline(std::ops::Range<usize>),
    Absent,
}

fn find_acroform(catalog_dict: &[u8]) -> AcroForm {
    let Some(pos) = find(catalog_dict, b"/AcroForm") else {
        return AcroForm::Absent;
    };
    let after = &catalog_dict[pos + b"/AcroForm".len()..];
    let trimmed_off = after
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(0);
    let value = &after[trimmed_off..];
    if value.starts_with(b"<<") {
        let abs_start = pos + b"/AcroForm".len() + trimmed_off;
        if let Ok(inline) = dict_body(&catalog_dict[abs_start..]) {
            return AcroForm::Inline(abs_start..abs_start + inline.len());
        }
        return AcroForm::Absent;
    }
    // Reference form: "n g R"
    let refs = crate::structure::parse_refs(&value[..value.len().min(24)]);
    match refs.first() {
        Some(r) => AcroForm::Reference(r.num),
        None => AcroForm::Absent,
    }
}

// ============================================================================
// Placeholder math and splicing
// ============================================================================

/// Reserved /Contents width in bytes, from the actual certificate sizes
/// rather than a fixed constant. Rounded up to a 1 KiB boundary so equal
/// inputs always reserve equal space.
fn placeholder_len(provider: &dyn SigningProvider, timestamped: bool) -> usize {
    let certs: usize = provider.certificate_der().len()
        + provider
            .chain_der()
            .iter()
            .map(|c| c.len())
            .sum::<usize>();
    // CMS framing, attributes, and the signature value itself
    let base = 2048;
    let tsa = if timestamped { 8192 } else { 0 };
    (certs + base + tsa).div_ceil(1024) * 1024
}

/// Byte positions of the reserved windows inside the updated document
struct PlaceholderWindow {
    /// Offset of `<` opening the /Contents hex string
    contents_start: usize,
    /// Hex characters between the angle brackets
    contents_len: usize,
    /// Offset of `[` opening the ByteRange placeholder
    byte_range_start: usize,
}

fn locate_placeholder(data: &[u8], sig_num: u32) -> Result<PlaceholderWindow> {
    let header = format!("{} 0 obj", sig_num);
    // Boundary check so "7 0 obj" never matches inside "17 0 obj"
    let mut search_end = data.len();
    let obj_start = loop {
        let pos = rfind(&data[..search_end], header.as_bytes())
            .ok_or_else(|| Error::Field(format!("signature object {} not found", sig_num)))?;
        if pos == 0 || !data[pos - 1].is_ascii_digit() {
            break pos;
        }
        search_end = pos;
    };
    let obj = &data[obj_start..];
    let end = find(obj, b"endobj").unwrap_or(obj.len());
    let obj = &obj[..end];

    let br_key = find(obj, b"/ByteRange")
        .ok_or_else(|| Error::Field("ByteRange placeholder missing".into()))?;
    let br_open = br_key
        + find(&obj[br_key..], b"[")
            .ok_or_else(|| Error::Field("ByteRange placeholder malformed".into()))?;

    let contents_key = find(obj, b"/Contents")
        .ok_or_else(|| Error::Field("Contents placeholder missing".into()))?;
    let open = contents_key
        + find(&obj[contents_key..], b"<")
            .ok_or_else(|| Error::Field("Contents placeholder malformed".into()))?;
    let close = open
        + find(&obj[open..], b">")
            .ok_or_else(|| Error::Field("Contents placeholder unterminated".into()))?;

    Ok(PlaceholderWindow {
        contents_start: obj_start + open,
        contents_len: close - open - 1,
        byte_range_start: obj_start + br_open,
    })
}

/// Fill the ByteRange slots, preserving the placeholder's exact width
fn splice_byte_range(data: &mut [u8], window: &PlaceholderWindow) {
    let gap_end = window.contents_start + window.contents_len + 2;
    let rendered = format!(
        "[0 {:<10} {:<10} {:<10}]",
        window.contents_start,
        gap_end,
        data.len() - gap_end
    );
    debug_assert_eq!(rendered.len(), BYTERANGE_PLACEHOLDER.len());
    let start = window.byte_range_start;
    data[start..start + rendered.len()].copy_from_slice(rendered.as_bytes());
}

/// Hash everything the ByteRange covers: before and after the /Contents
/// hex string, brackets included in the gap
fn byte_range_digest(data: &[u8], window: &PlaceholderWindow, hash: HashAlgorithm) -> Vec<u8> {
    let gap_end = window.contents_start + window.contents_len + 2;
    let mut joined = Vec::with_capacity(data.len() - (gap_end - window.contents_start));
    joined.extend_from_slice(&data[..window.contents_start]);
    joined.extend_from_slice(&data[gap_end..]);
    hash.digest(&joined)
}

/// Write the CMS DER as hex into the reserved window, zero-padded to the
/// full width so the document length never changes
fn splice_contents(data: &mut [u8], window: &PlaceholderWindow, cms: &[u8]) -> Result<()> {
    let needed = cms.len() * 2;
    if needed > window.contents_len {
        return Err(Error::SignatureTooLarge {
            needed,
            available: window.contents_len,
        });
    }
    let start = window.contents_start + 1;
    for (i, byte) in cms.iter().enumerate() {
        let hex = format!("{:02X}", byte);
        data[start + i * 2..start + i * 2 + 2].copy_from_slice(hex.as_bytes());
    }
    // Remaining width stays zeroed from the placeholder
    Ok(())
}

/// `D:YYYYMMDDHHmmSS+00'00'`
fn format_pdf_date(t: OffsetDateTime) -> String {
    format!(
        "D:{:04}{:02}{:02}{:02}{:02}{:02}+00'00'",
        t.year(),
        u8::from(t.month()),
        t.day(),
        t.hour(),
        t.minute(),
        t.second()
    )
}

// ============================================================================
// CMS inspection (for LTV)
// ============================================================================

/// Decode the /Contents hex string of a signature dictionary, padding
/// included (the VRI key hashes the padded bytes)
fn extract_contents(sig_obj: &[u8]) -> Result<Vec<u8>> {
    let key = find(sig_obj, b"/Contents")
        .ok_or_else(|| Error::Field("signature carries no /Contents".into()))?;
    let open = key
        + find(&sig_obj[key..], b"<")
            .ok_or_else(|| Error::Field("/Contents is not a hex string".into()))?;
    let close = open
        + find(&sig_obj[open..], b">")
            .ok_or_else(|| Error::Field("/Contents unterminated".into()))?;
    let hex: Vec<u8> = sig_obj[open + 1..close]
        .iter()
        .copied()
        .filter(|b| b.is_ascii_hexdigit())
        .collect();
    let mut bytes = Vec::with_capacity(hex.len() / 2);
    for pair in hex.chunks_exact(2) {
        let s = std::str::from_utf8(pair).map_err(|_| Error::Field("bad hex".into()))?;
        bytes.push(
            u8::from_str_radix(s, 16).map_err(|_| Error::Field("bad hex in /Contents".into()))?,
        );
    }
    Ok(bytes)
}

/// Certificates embedded in a CMS ContentInfo, in order
fn embedded_certificates(contents: &[u8]) -> Result<Vec<Vec<u8>>> {
    use crate::asn1::{DerReader, TAG_OID, TAG_SEQUENCE};
    // Trailing placeholder padding is zero bytes past the DER element
    let mut content_info = DerReader::new(contents).nested(TAG_SEQUENCE)?;
    content_info.read(TAG_OID)?;
    let (tag, signed_data_tlv) = content_info.read_any()?;
    if tag != 0xA0 {
        return Err(Error::Asn1("ContentInfo content missing".into()));
    }
    let mut sd = DerReader::new(signed_data_tlv).nested(TAG_SEQUENCE)?;
    sd.skip()?; // version
    sd.skip()?; // digestAlgorithms
    sd.skip()?; // encapContentInfo
    if sd.peek_tag() != Some(0xA0) {
        return Ok(Vec::new());
    }
    let (_, certs_content) = sd.read_any()?;
    let mut certs = Vec::new();
    let mut reader = DerReader::new(certs_content);
    while !reader.is_empty() {
        certs.push(reader.read_tlv()?.to_vec());
    }
    Ok(certs)
}

/// Certificate in `pool` whose subject equals `leaf`'s issuer
fn find_issuer<'p>(pool: &'p [Vec<u8>], leaf: &SignerCertificate<'_>) -> Option<&'p Vec<u8>> {
    let issuer_name = leaf.issuer().ok()?;
    pool.iter().find(|der| {
        SignerCertificate::new(der)
            .subject()
            .map(|s| s == issuer_name)
            .unwrap_or(false)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asn1::{self, context_primitive, octet_string, oid, sequence, tlv};
    use crate::provider::KeyringProvider;
    use crate::testcert::{cert_with_extensions, simple_cert};
    use time::macros::datetime;

    /// AIA extensions block naming `url` as the OCSP responder
    fn aia_extensions(url: &str) -> Vec<u8> {
        let aia_value = sequence(&[&sequence(&[
            &oid(asn1::OID_AD_OCSP),
            &context_primitive(6, url.as_bytes()),
        ])]);
        sequence(&[&sequence(&[
            &oid(asn1::OID_AUTHORITY_INFO_ACCESS),
            &octet_string(&aia_value),
        ])])
    }

    #[test]
    fn test_ltv_gathers_evidence_for_every_chain_certificate() {
        // One OCSPResponse (responseStatus 0) per expected request, with
        // distinct payloads so pooling cannot collapse them
        let resp_one = sequence(&[&tlv(0x0A, &[0]), &octet_string(b"proof-one")]);
        let resp_two = sequence(&[&tlv(0x0A, &[0]), &octet_string(b"proof-two")]);
        let url = crate::testhttp::serve(vec![resp_one, resp_two]);

        let leaf = cert_with_extensions(&[0x01], "Signer", Some(aia_extensions(&url)));
        let intermediate =
            cert_with_extensions(&[0x02], "Fixture CA", Some(aia_extensions(&url)));
        let (provider, _) = KeyringProvider::test_p256(leaf, vec![intermediate]);
        let signer = PdfSigner::new(&provider);

        let request =
            SignatureRequest::new().with_signing_time(datetime!(2026-08-20 10:00:00 UTC));
        let signed = signer.sign(&crate::testpdf::minimal_pdf(), &request).unwrap();
        let ltv = signer.enable_ltv(&signed).unwrap();

        let text = String::from_utf8_lossy(&ltv);
        // Both responses were fetched and embedded
        assert!(text.contains("proof-one"));
        assert!(text.contains("proof-two"));
        let ocsps_at = text.find("/OCSPs [").unwrap();
        let close = ocsps_at + text[ocsps_at..].find(']').unwrap();
        assert_eq!(text[ocsps_at..close].matches(" R").count(), 2);
        // Both chain certificates landed in the pool
        let certs_at = text.find("/Certs [").unwrap();
        let close = certs_at + text[certs_at..].find(']').unwrap();
        assert_eq!(text[certs_at..close].matches(" R").count(), 2);
    }

    #[test]
    fn test_pdf_date_format() {
        let t = datetime!(2026-08-01 09:05:03 UTC);
        assert_eq!(format_pdf_date(t), "D:20260801090503+00'00'");
    }

    #[test]
    fn test_byte_range_render_width() {
        let rendered = format!("[0 {:<10} {:<10} {:<10}]", 1234, 56789, 101112);
        assert_eq!(rendered.len(), BYTERANGE_PLACEHOLDER.len());
    }

    #[test]
    fn test_placeholder_len_deterministic_and_rounded() {
        let cert = simple_cert(&[0x42], "Signer");
        let (provider, _) = KeyringProvider::test_p256(cert, Vec::new());
        let a = placeholder_len(&provider, false);
        let b = placeholder_len(&provider, false);
        assert_eq!(a, b);
        assert_eq!(a % 1024, 0);
        // A timestamp reserves extra room
        assert!(placeholder_len(&provider, true) > a);
    }

    #[test]
    fn test_dict_body_nested() {
        let obj = b"7 0 obj\n<< /A << /B 1 >> /C 2 >>\nendobj";
        let dict = dict_body(obj).unwrap();
        assert!(dict.starts_with(b"<<"));
        assert!(dict.ends_with(b">>"));
        assert!(dict.windows(2).filter(|w| w == b">>").count() == 2);
    }

    #[test]
    fn test_push_array_entry() {
        let dict = b"<< /Fields [1 0 R] >>";
        let out = push_array_entry(dict, "Fields", 9).unwrap();
        assert_eq!(out, b"<< /Fields [1 0 R 9 0 R] >>".to_vec());
    }

    #[test]
    fn test_append_dict_entry() {
        let dict = b"<< /Type /Page >>";
        let out = append_dict_entry(dict, "/Annots [5 0 R]");
        assert_eq!(out, b"<< /Type /Page /Annots [5 0 R] >>".to_vec());
    }

    #[test]
    fn test_set_ref_entry_replaces() {
        let dict = b"<< /DSS 4 0 R /Other 1 >>";
        let out = set_ref_entry(dict, "DSS", 12);
        assert_eq!(out, b"<< /DSS 12 0 R /Other 1 >>".to_vec());
        // Absent key gets appended
        let out2 = set_ref_entry(b"<< /Type /Catalog >>", "DSS", 12);
        assert_eq!(out2, b"<< /Type /Catalog /DSS 12 0 R >>".to_vec());
    }

    #[test]
    fn test_find_acroform_variants() {
        assert!(matches!(
            find_acroform(b"<< /Type /Catalog >>"),
            AcroForm::Absent
        ));
        assert!(matches!(
            find_acroform(b"<< /AcroForm 7 0 R >>"),
            AcroForm::Reference(7)
        ));
        let inline = b"<< /AcroForm << /Fields [] >> /Pages 2 0 R >>";
        match find_acroform(inline) {
            AcroForm::Inline(range) => {
                assert_eq!(&inline[range], b"<< /Fields [] >>");
            }
            _ => panic!("expected inline AcroForm"),
        }
    }

    #[test]
    fn test_extract_contents_includes_padding() {
        let obj = b"9 0 obj << /Contents <30010200> >> endobj";
        let bytes = extract_contents(obj).unwrap();
        assert_eq!(bytes, vec![0x30, 0x01, 0x02, 0x00]);
    }

    #[test]
    fn test_certification_level_range_checked() {
        let cert = simple_cert(&[0x42], "Signer");
        let (provider, _) = KeyringProvider::test_p256(cert, Vec::new());
        let signer = PdfSigner::new(&provider);
        let request = SignatureRequest::new().with_certification_level(4);
        let err = signer.sign(&crate::testpdf::minimal_pdf(), &request).unwrap_err();
        assert!(matches!(err, Error::Field(_)));
    }
}
