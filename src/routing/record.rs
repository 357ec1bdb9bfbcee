use bstr::BString;
use noodles::sam::alignment::record::data::field::Tag;
use noodles::sam::alignment::record_buf::data::field::Value;
use noodles::sam::alignment::RecordBuf;

/// The parts of an alignment record the router reads and rewrites
pub trait AlignmentRecord {
    fn read_name(&self) -> Option<&[u8]>;

    fn set_read_name(&mut self, name: Vec<u8>);

    /// String value of an attribute; other value types read as absent
    fn get_attribute(&self, tag: Tag) -> Option<&[u8]>;

    fn set_attribute(&mut self, tag: Tag, value: &str);

    /// Is the attribute present, whatever its type?
    fn has_attribute(&self, tag: Tag) -> bool;

    fn is_paired(&self) -> bool;

    /// Does the record fail the vendor quality check?
    fn is_qc_fail(&self) -> bool;
}

impl AlignmentRecord for RecordBuf {
    fn read_name(&self) -> Option<&[u8]> {
        self.name().map(<_ as AsRef<[u8]>>::as_ref)
    }

    fn set_read_name(&mut self, name: Vec<u8>) {
        *self.name_mut() = Some(BString::from(name));
    }

    fn get_attribute(&self, tag: Tag) -> Option<&[u8]> {
        match self.data().get(&tag) {
            Some(Value::String(s)) => Some(s.as_slice()),
            _ => None,
        }
    }

    fn set_attribute(&mut self, tag: Tag, value: &str) {
        self.data_mut().insert(tag, Value::from(value));
    }

    fn has_attribute(&self, tag: Tag) -> bool {
        self.data().get(&tag).is_some()
    }

    fn is_paired(&self) -> bool {
        self.flags().is_segmented()
    }

    fn is_qc_fail(&self) -> bool {
        self.flags().is_qc_fail()
    }
}

/// One unit of work: a record and, for paired reads, its mate
#[derive(Debug, Clone, PartialEq)]
pub struct ReadUnit<R> {
    pub primary: R,
    pub mate: Option<R>,
}

impl<R> ReadUnit<R> {
    pub fn single(primary: R) -> Self {
        Self {
            primary,
            mate: None,
        }
    }

    pub fn paired(primary: R, mate: R) -> Self {
        Self {
            primary,
            mate: Some(mate),
        }
    }

    /// The primary record followed by the mate, if any
    pub fn records(&self) -> impl Iterator<Item = &R> {
        std::iter::once(&self.primary).chain(self.mate.as_ref())
    }

    pub fn records_mut(&mut self) -> impl Iterator<Item = &mut R> {
        std::iter::once(&mut self.primary).chain(self.mate.as_mut())
    }
}
