use crate::avp::{flags, Avp, AvpValue};
use crate::diameter::{self, ApplicationId, CommandCode, DiameterHeader, DiameterMessage};
use crate::dictionary::DEFAULT_DICT;
use std::fmt;

impl fmt::Display for DiameterMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\n", self.header)?;
        write!(
            f,
            "  {:<40} {:>8} {:>5}  {} {} {}  {:<16}  {}\n",
            "AVP", "Vendor", "Code", "V", "M", "P", "Type", "Value"
        )?;

        for avp in &self.avps {
            fmt_avp(f, avp, 0, self.header.application_id as u32)?;
        }

        Ok(())
    }
}

impl fmt::Display for DiameterHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let request_flag = if self.flags & diameter::flags::REQUEST != 0 {
            "Request"
        } else {
            "Answer"
        };
        let error_flag = if self.flags & diameter::flags::ERROR != 0 {
            " Error"
        } else {
            ""
        };
        let proxyable_flag = if self.flags & diameter::flags::PROXYABLE != 0 {
            " Proxyable"
        } else {
            ""
        };
        let retransmit_flag = if self.flags & diameter::flags::RETRANSMIT != 0 {
            " Retransmit"
        } else {
            ""
        };

        write!(
            f,
            "{}({}) {}({}) {}{}{}{} {}, {}",
            self.code,
            self.code as u32,
            self.application_id,
            self.application_id as u32,
            request_flag,
            error_flag,
            proxyable_flag,
            retransmit_flag,
            self.hop_by_hop_id,
            self.end_to_end_id
        )
    }
}

impl fmt::Display for CommandCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl fmt::Display for ApplicationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl fmt::Display for AvpValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AvpValue::Address(avp) => avp.fmt(f),
            AvpValue::DiameterURI(avp) => avp.fmt(f),
            AvpValue::Enumerated(avp) => avp.fmt(f),
            AvpValue::Float32(avp) => avp.fmt(f),
            AvpValue::Float64(avp) => avp.fmt(f),
            AvpValue::Grouped(_) => Ok(()),
            AvpValue::IPFilterRule(avp) => avp.fmt(f),
            AvpValue::IPv4(avp) => avp.fmt(f),
            AvpValue::Identity(avp) => avp.fmt(f),
            AvpValue::Integer32(avp) => avp.fmt(f),
            AvpValue::Integer64(avp) => avp.fmt(f),
            AvpValue::OctetString(avp) => avp.fmt(f),
            AvpValue::QoSFilterRule(avp) => avp.fmt(f),
            AvpValue::Time(avp) => avp.fmt(f),
            AvpValue::UTF8String(avp) => avp.fmt(f),
            AvpValue::Unknown(avp) => avp.fmt(f),
            AvpValue::Unsigned32(avp) => avp.fmt(f),
            AvpValue::Unsigned64(avp) => avp.fmt(f),
        }
    }
}

impl fmt::Display for Avp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt_avp(f, self, 0, 0)
    }
}

fn fmt_avp(f: &mut fmt::Formatter<'_>, avp: &Avp, depth: usize, app_id: u32) -> fmt::Result {
    let name = DEFAULT_DICT
        .find_by_code(app_id, avp.get_code(), avp.get_vendor_id().unwrap_or(0))
        .map(|def| def.name.clone())
        .unwrap_or_else(|| "Unknown".to_string());
    let name = format!("{}{}", "  ".repeat(depth), name);
    let vendor_id = match avp.get_vendor_id() {
        Some(v) => v.to_string(),
        None => "".to_string(),
    };

    write!(
        f,
        "  {:<40} {:>8} {:>5}  {} {} {}  {:<16}  {}\n",
        name,
        vendor_id,
        avp.get_code(),
        get_bool_unicode(avp.get_flags() & flags::V != 0),
        get_bool_unicode(avp.get_flags() & flags::M != 0),
        get_bool_unicode(avp.get_flags() & flags::P != 0),
        avp.get_value().get_type_name(),
        avp.get_value()
    )?;

    if let AvpValue::Grouped(group) = avp.get_value() {
        for sub in group.avps() {
            fmt_avp(f, sub, depth + 1, app_id)?;
        }
    }

    Ok(())
}

fn get_bool_unicode(v: bool) -> &'static str {
    if v {
        "✓"
    } else {
        "✗"
    }
}

#[cfg(test)]
mod tests {
    use crate::avp;
    use crate::avp::flags::M;
    use crate::avp::Enumerated;
    use crate::avp::Grouped;
    use crate::avp::Identity;
    use crate::avp::UTF8String;
    use crate::avp::Unsigned32;
    use crate::diameter::flags;
    use crate::diameter::{ApplicationId, CommandCode, DiameterMessage};

    #[test]
    fn test_display_message() {
        let mut ccr = DiameterMessage::new(
            CommandCode::CreditControl,
            ApplicationId::CreditControl,
            flags::REQUEST,
            1123158610,
            3102381851,
        );
        ccr.add_avp(avp!(263, None, M, UTF8String::new("ses;12345888")));
        ccr.add_avp(avp!(264, None, M, Identity::new("host.example.com")));
        ccr.add_avp(avp!(
            456,
            None,
            M,
            Grouped::new(vec![avp!(432, None, M, Unsigned32::new(7))])
        ));
        ccr.add_avp(avp!(416, None, M, Enumerated::new(1)));

        let out = ccr.to_string();
        assert!(out.contains("CreditControl(272)"));
        assert!(out.contains("Session-Id"));
        assert!(out.contains("ses;12345888"));
        assert!(out.contains("Rating-Group"));
    }
}
