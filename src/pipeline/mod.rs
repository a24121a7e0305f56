pub mod certificate_extraction; // Background AI extraction of uploaded certificates
